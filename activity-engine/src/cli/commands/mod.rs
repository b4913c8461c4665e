pub mod compute;
pub mod eval;
pub mod validate;
