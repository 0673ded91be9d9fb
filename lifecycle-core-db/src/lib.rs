pub mod lifecycle;
pub mod models;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod in_memory;

// Re-exports
pub use lifecycle::*;
pub use models::*;
pub use repository::*;
