pub mod create;
pub mod repo_impl;
pub mod search;

pub use repo_impl::AuditLogRepositoryImpl;
