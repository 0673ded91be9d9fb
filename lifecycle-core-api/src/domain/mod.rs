pub mod action;
pub mod time_zone;
pub mod value;

pub use action::*;
pub use time_zone::*;
pub use value::*;
