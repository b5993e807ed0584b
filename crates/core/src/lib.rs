#![forbid(unsafe_code)]

pub mod error;
pub mod extract;
pub mod model;
pub mod prompt;
pub mod time;

pub use error::Error;
pub use time::Clock;
