pub mod config;
pub mod context;
pub mod domain;
pub mod error;

pub use config::*;
pub use context::*;
pub use domain::*;
pub use error::*;
