pub mod audit_log_repository;
pub mod entity_store;
