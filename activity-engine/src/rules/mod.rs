//! Rule engine: carry-over between periods and conditional formatting

mod carry;
mod color;

pub use carry::*;
pub use color::*;
