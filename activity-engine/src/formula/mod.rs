//! Formula engine for calculated fields
//!
//! Formulas are restricted arithmetic over `[FieldName]` references:
//!
//! ```text
//! [Versato] - [Dovuto] + [Credito_Prec]
//! ([Fatturato] - [Costi]) / [Fatturato] * 100
//! ```
//!
//! A formula is parsed once into an AST ([`Formula`]) and evaluated many
//! times against a [`ValueSource`]. Only digits, `.`/`,`, `+ - * / ( )`,
//! whitespace and bracketed references are accepted; anything else is
//! rejected by the lexer as an unsafe expression.

pub mod ast;
pub mod error;
pub mod eval;
pub mod number;
pub mod parser;
pub mod validate;

pub use ast::{BinaryOp, Expr, Formula};
pub use error::FormulaError;
pub use eval::{Operand, ValueSource, evaluate};
pub use number::{NumberFormat, parse_decimal};
pub use parser::{MAX_FORMULA_DEPTH, parse_formula};
pub use validate::{FormulaValidationError, validate};
