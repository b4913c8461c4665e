//! Errors raised while parsing or evaluating formulas

use serde::Serialize;

use crate::schema::FieldId;

/// Formula failure; at runtime these are scoped to a single cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormulaError {
    /// A character or substituted value outside the arithmetic allow-list
    UnsafeExpression { token: String, position: usize },
    /// Malformed arithmetic (dangling operator, unbalanced parenthesis, ...)
    Syntax { message: String, position: usize },
    DivisionByZero,
    /// Intermediate result does not fit a decimal
    Overflow,
    /// The field takes part in a reference cycle
    CyclicDependency { cycle: Vec<String> },
    /// A calculated field this formula needs failed first
    DependencyFailed { field: String },
}

impl FormulaError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        FormulaError::Syntax {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn cycle(fields: &[FieldId]) -> Self {
        FormulaError::CyclicDependency {
            cycle: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Short marker shown in place of the cell value
    pub fn marker(&self) -> &'static str {
        match self {
            FormulaError::UnsafeExpression { .. } => "#UNSAFE",
            FormulaError::Syntax { .. } => "#SYNTAX",
            FormulaError::DivisionByZero => "#DIV/0",
            FormulaError::Overflow => "#OVERFLOW",
            FormulaError::CyclicDependency { .. } => "#CYCLE",
            FormulaError::DependencyFailed { .. } => "#REF",
        }
    }
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormulaError::UnsafeExpression { token, position } => {
                write!(f, "unsafe expression at position {}: '{}'", position, token)
            }
            FormulaError::Syntax { message, position } => {
                write!(f, "syntax error at position {}: {}", position, message)
            }
            FormulaError::DivisionByZero => write!(f, "division by zero"),
            FormulaError::Overflow => write!(f, "numeric overflow"),
            FormulaError::CyclicDependency { cycle } => {
                write!(f, "cyclic dependency between {}", cycle.join(", "))
            }
            FormulaError::DependencyFailed { field } => {
                write!(f, "depends on '{}', which could not be computed", field)
            }
        }
    }
}

impl std::error::Error for FormulaError {}
