//! AST types for field formulas

use rust_decimal::Decimal;

use crate::schema::FieldId;

/// A parsed formula, ready to be evaluated many times
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// The original formula text (for display/debugging)
    pub source: String,
    pub expr: Expr,
}

impl Formula {
    pub fn new(source: impl Into<String>, expr: Expr) -> Self {
        Self {
            source: source.into(),
            expr,
        }
    }

    /// Distinct field references, in order of first appearance
    pub fn references(&self) -> Vec<&FieldId> {
        let mut refs = Vec::new();
        collect_references(&self.expr, &mut refs);
        refs
    }

    /// Whether the formula mentions `field`
    pub fn references_field(&self, field: &FieldId) -> bool {
        self.references().contains(&field)
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn collect_references<'a>(expr: &'a Expr, refs: &mut Vec<&'a FieldId>) {
    match expr {
        Expr::Field(id) => {
            if !refs.contains(&id) {
                refs.push(id);
            }
        }
        Expr::Number(_) => {}
        Expr::Binary { left, right, .. } => {
            collect_references(left, refs);
            collect_references(right, refs);
        }
        Expr::Negate(inner) => collect_references(inner, refs),
    }
}

/// An arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal: `2`, `0.22`, `0,22`
    Number(Decimal),
    /// A field reference: `[Name]`
    Field(FieldId),
    /// Binary operation: `a + b`, `a * b`
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Negation: `-expr`
    Negate(Box<Expr>),
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
        }
    }
}
