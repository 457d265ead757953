#![no_std]

mod line;
mod sensor;
mod types;

pub use line::*;
pub use sensor::*;
pub use types::*;
