pub mod executor;
pub mod postgres_repositories;
pub mod repository;
pub mod utils;

pub use executor::Executor;
pub use postgres_repositories::PostgresRepositories;
pub use repository::audit_log_repository::AuditLogRepositoryImpl;
pub use repository::entity_store::{EntityStoreImpl, PostgresTransaction};

#[cfg(test)]
pub mod test_helper;
