pub mod audit_log_repository;
pub mod entity_store;
pub mod introspection;
pub mod pagination;

// Re-exports
pub use audit_log_repository::*;
pub use entity_store::*;
pub use introspection::*;
pub use pagination::*;
