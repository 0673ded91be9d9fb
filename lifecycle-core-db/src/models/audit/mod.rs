pub mod audit_log;
pub mod audit_log_query;

pub use audit_log::*;
pub use audit_log_query::*;
