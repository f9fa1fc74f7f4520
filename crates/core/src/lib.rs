#![forbid(unsafe_code)]

pub mod error;
pub mod gate;
pub mod model;
pub mod time;

pub use error::Error;
pub use gate::AccessGate;
pub use time::Clock;
