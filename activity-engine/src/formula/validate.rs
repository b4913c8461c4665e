//! Authoring-time validation of formulas
//!
//! Runs when an administrator saves a calculated field. A formula that fails
//! here must not be persisted.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::error::FormulaError;
use super::parser::parse_formula;
use crate::schema::{FieldId, SchemaField};

/// Why a formula cannot be saved
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValidationError {
    /// The formula does not parse
    Parse(FormulaError),
    /// The formula references no field at all
    NoFieldReference { available: Vec<String> },
    /// A reference names a field that does not exist
    UnknownField { name: String, available: Vec<String> },
    /// A reference names another calculated field
    CalculatedReference { name: String, available: Vec<String> },
    /// Evaluating with every field set to 1 failed
    TrialEvaluation(FormulaError),
}

impl FormulaValidationError {
    /// Names of the fields a formula may reference, to guide correction
    pub fn available(&self) -> &[String] {
        match self {
            FormulaValidationError::NoFieldReference { available }
            | FormulaValidationError::UnknownField { available, .. }
            | FormulaValidationError::CalculatedReference { available, .. } => available,
            FormulaValidationError::Parse(_) | FormulaValidationError::TrialEvaluation(_) => &[],
        }
    }
}

impl std::fmt::Display for FormulaValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormulaValidationError::Parse(e) => write!(f, "invalid formula: {}", e),
            FormulaValidationError::NoFieldReference { available } => write!(
                f,
                "formula must reference at least one field; available fields: {}",
                available.join(", ")
            ),
            FormulaValidationError::UnknownField { name, available } => write!(
                f,
                "field '{}' does not exist; available fields: {}",
                name,
                available.join(", ")
            ),
            FormulaValidationError::CalculatedReference { name, available } => write!(
                f,
                "field '{}' is calculated and cannot be referenced; available fields: {}",
                name,
                available.join(", ")
            ),
            FormulaValidationError::TrialEvaluation(e) => {
                write!(f, "formula fails when every field is 1: {}", e)
            }
        }
    }
}

impl std::error::Error for FormulaValidationError {}

/// Validate a formula against the fields it may reference
///
/// Checks that the formula parses, references at least one field, that every
/// reference exists among `fields` and is not itself calculated, and that a
/// trial evaluation with `1` for every field succeeds.
pub fn validate<F: SchemaField>(formula: &str, fields: &[F]) -> Result<(), FormulaValidationError> {
    let available: Vec<String> = fields
        .iter()
        .filter(|f| !f.is_calculated())
        .map(|f| f.field_id().to_string())
        .collect();

    let parsed = parse_formula(formula).map_err(FormulaValidationError::Parse)?;

    let references = parsed.references();
    if references.is_empty() {
        return Err(FormulaValidationError::NoFieldReference { available });
    }

    for reference in &references {
        match fields.iter().find(|f| f.field_id() == *reference) {
            None => {
                return Err(FormulaValidationError::UnknownField {
                    name: reference.to_string(),
                    available,
                });
            }
            Some(field) if field.is_calculated() => {
                return Err(FormulaValidationError::CalculatedReference {
                    name: field.field_id().to_string(),
                    available,
                });
            }
            Some(_) => {}
        }
    }

    let trial: BTreeMap<FieldId, Decimal> = references
        .into_iter()
        .map(|id| (id.clone(), Decimal::ONE))
        .collect();
    parsed
        .evaluate(&trial)
        .map(|_| ())
        .map_err(FormulaValidationError::TrialEvaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldDefinition};

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new(FieldId::parse("A").unwrap(), DataType::Decimal),
            FieldDefinition::calculated(FieldId::parse("B").unwrap(), "[A] + 1"),
            FieldDefinition::new(FieldId::parse("C").unwrap(), DataType::Decimal),
        ]
    }

    #[test]
    fn test_valid_formula() {
        assert_eq!(validate("[A] * 2", &fields()), Ok(()));
        assert_eq!(validate("[a] / ([c] + 1)", &fields()), Ok(()));
    }

    #[test]
    fn test_calculated_reference_named() {
        let err = validate("[B] * 2", &fields()).unwrap_err();
        assert!(matches!(
            err,
            FormulaValidationError::CalculatedReference { ref name, .. } if name == "B"
        ));
        assert_eq!(err.available(), &["A".to_string(), "C".to_string()]);
        assert!(err.to_string().contains("'B' is calculated"));
        assert!(err.to_string().contains("A, C"));
    }

    #[test]
    fn test_unknown_field() {
        let err = validate("[A] + [Z]", &fields()).unwrap_err();
        assert!(matches!(
            err,
            FormulaValidationError::UnknownField { ref name, .. } if name == "Z"
        ));
    }

    #[test]
    fn test_requires_a_reference() {
        let err = validate("2 + 2", &fields()).unwrap_err();
        assert!(matches!(err, FormulaValidationError::NoFieldReference { .. }));
    }

    #[test]
    fn test_trial_evaluation_catches_division_by_zero() {
        let err = validate("[A] / ([C] - 1)", &fields()).unwrap_err();
        assert_eq!(
            err,
            FormulaValidationError::TrialEvaluation(FormulaError::DivisionByZero)
        );
    }

    #[test]
    fn test_parse_errors_surface() {
        let err = validate("[A] + ", &fields()).unwrap_err();
        assert!(matches!(err, FormulaValidationError::Parse(FormulaError::Syntax { .. })));

        let err = validate("[A] % 2", &fields()).unwrap_err();
        assert!(matches!(
            err,
            FormulaValidationError::Parse(FormulaError::UnsafeExpression { .. })
        ));
    }

    #[test]
    fn test_accepts_borrowed_fields() {
        let owned = fields();
        let borrowed: Vec<&FieldDefinition> = owned.iter().collect();
        assert_eq!(validate("[C]", &borrowed), Ok(()));
    }
}
