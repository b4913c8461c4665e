//! Evaluator for parsed formulas

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use super::ast::*;
use super::error::FormulaError;
use super::number::parse_decimal;
use super::parser::parse_formula;
use crate::schema::FieldId;

/// What a field reference resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    /// Unknown field or blank value; evaluates as zero
    Missing,
    Number(Decimal),
    /// A value that does not read as a number
    Text(Cow<'a, str>),
}

impl<'a> Operand<'a> {
    /// Classify a raw string value
    pub fn from_raw(raw: &'a str) -> Self {
        if raw.trim().is_empty() {
            return Operand::Missing;
        }
        match parse_decimal(raw) {
            Some(n) => Operand::Number(n),
            None => Operand::Text(Cow::Borrowed(raw)),
        }
    }
}

/// Snapshot of named values a formula is evaluated against
pub trait ValueSource {
    fn resolve(&self, field: &FieldId) -> Operand<'_>;
}

impl ValueSource for HashMap<String, String> {
    fn resolve(&self, field: &FieldId) -> Operand<'_> {
        // Keys are free-form here, so match them case-insensitively. An
        // exact-case key wins, then the smallest of the case variants.
        self.get(field.as_str())
            .or_else(|| {
                self.iter()
                    .filter(|(name, _)| field.matches(name))
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, raw)| raw)
            })
            .map(|raw| Operand::from_raw(raw))
            .unwrap_or(Operand::Missing)
    }
}

impl ValueSource for BTreeMap<FieldId, String> {
    fn resolve(&self, field: &FieldId) -> Operand<'_> {
        self.get(field)
            .map(|raw| Operand::from_raw(raw))
            .unwrap_or(Operand::Missing)
    }
}

impl ValueSource for BTreeMap<FieldId, Decimal> {
    fn resolve(&self, field: &FieldId) -> Operand<'_> {
        self.get(field)
            .map(|n| Operand::Number(*n))
            .unwrap_or(Operand::Missing)
    }
}

/// Parse and evaluate a formula against a string-keyed value map
///
/// Unknown or blank references count as zero. Values accept `,` or `.` as
/// decimal separator.
pub fn evaluate(formula: &str, values: &HashMap<String, String>) -> Result<Decimal, FormulaError> {
    parse_formula(formula)?.evaluate(values)
}

impl Formula {
    /// Evaluate against a value snapshot
    pub fn evaluate<S: ValueSource + ?Sized>(&self, values: &S) -> Result<Decimal, FormulaError> {
        eval_expr(&self.expr, values)
    }
}

fn eval_expr<S: ValueSource + ?Sized>(expr: &Expr, values: &S) -> Result<Decimal, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),

        Expr::Field(id) => match values.resolve(id) {
            Operand::Missing => Ok(Decimal::ZERO),
            Operand::Number(n) => Ok(n),
            Operand::Text(text) => Err(FormulaError::UnsafeExpression {
                token: text.into_owned(),
                position: 0,
            }),
        },

        Expr::Binary { left, op, right } => {
            let left_val = eval_expr(left, values)?;
            let right_val = eval_expr(right, values)?;
            eval_binary(left_val, *op, right_val)
        }

        Expr::Negate(inner) => {
            let val = eval_expr(inner, values)?;
            Ok(-val)
        }
    }
}

fn eval_binary(left: Decimal, op: BinaryOp, right: Decimal) -> Result<Decimal, FormulaError> {
    let result = match op {
        BinaryOp::Add => left.checked_add(right),
        BinaryOp::Sub => left.checked_sub(right),
        BinaryOp::Mul => left.checked_mul(right),
        BinaryOp::Div => {
            if right.is_zero() {
                return Err(FormulaError::DivisionByZero);
            }
            left.checked_div(right)
        }
    };
    result.ok_or(FormulaError::Overflow)
}
