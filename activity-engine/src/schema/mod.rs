//! Activity schemas: fields, period layouts and rules
//!
//! Everything here is defined by an administrator at runtime and supplied to
//! the engine as an already-loaded snapshot.

mod activity;
mod catalog;
mod field;
mod issue;
mod period;
mod rules;

pub use activity::*;
pub use catalog::*;
pub use field::*;
pub use issue::*;
pub use period::*;
pub use rules::*;
