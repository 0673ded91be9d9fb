pub mod audit_logger;
pub mod behaviors;
pub mod cascade;
pub mod orchestrator;
pub mod permission;
pub mod rules;
pub mod soft_delete;
pub mod timezone;

// Re-exports
pub use audit_logger::*;
pub use behaviors::*;
pub use orchestrator::*;
pub use permission::*;
pub use rules::*;
pub use soft_delete::*;
pub use timezone::*;
