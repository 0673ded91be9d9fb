pub mod columns;
pub mod delete;
pub mod find;
pub mod insert;
pub mod load;
pub mod repo_impl;
pub mod update;

pub use repo_impl::{EntityStoreImpl, PostgresTransaction};
