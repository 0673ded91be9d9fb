pub mod audit;
pub mod auditable;
pub mod entity;
pub mod identifiable;
pub mod schema;

// Re-exports
pub use audit::*;
pub use auditable::*;
pub use entity::*;
pub use identifiable::*;
pub use schema::*;
