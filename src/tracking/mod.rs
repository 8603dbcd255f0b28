mod controller;
mod error;

pub use controller::*;
pub use error::*;
