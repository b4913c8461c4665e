//! Per-client value storage
//!
//! Raw values stay strings keyed by [`FieldId`](crate::schema::FieldId);
//! [`Value`] gives them a type at the boundary.

mod memory;
mod record;
mod value;

pub use memory::*;
pub use record::*;
pub use value::*;
