//! In-process collaborators for tests: a transactional entity store, an
//! audit log repository and a fixed authorizer.

pub mod memory_audit_log_repository;
pub mod memory_store;
pub mod static_authorizer;

// Re-exports
pub use memory_audit_log_repository::*;
pub use memory_store::*;
pub use static_authorizer::*;
