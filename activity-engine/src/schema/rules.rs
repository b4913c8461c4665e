//! Carry-over and color rule definitions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::FieldId;

/// When a carry-over rule fires, judged on the origin value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryCondition {
    /// Always carry the value (default)
    #[default]
    Always,
    /// Only when the value is strictly greater than zero
    IfPositive,
    /// Only when the value is strictly less than zero
    IfNegative,
    /// Only when the value is not zero
    IfNonZero,
}

impl CarryCondition {
    /// Evaluate this condition against the origin value
    pub fn holds(&self, value: &Decimal) -> bool {
        match self {
            CarryCondition::Always => true,
            CarryCondition::IfPositive => value.is_sign_positive() && !value.is_zero(),
            CarryCondition::IfNegative => value.is_sign_negative() && !value.is_zero(),
            CarryCondition::IfNonZero => !value.is_zero(),
        }
    }

    /// Get display label for UI
    pub fn label(&self) -> &'static str {
        match self {
            CarryCondition::Always => "Always",
            CarryCondition::IfPositive => "If positive",
            CarryCondition::IfNegative => "If negative",
            CarryCondition::IfNonZero => "If not zero",
        }
    }
}

impl std::fmt::Display for CarryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CarryCondition::Always => write!(f, "always"),
            CarryCondition::IfPositive => write!(f, "> 0"),
            CarryCondition::IfNegative => write!(f, "< 0"),
            CarryCondition::IfNonZero => write!(f, "!= 0"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Moves a value from one period's field into the next period's field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryOverRule {
    pub id: i64,
    /// Field read in period `p`
    pub origin_field: FieldId,
    /// Field written in period `p + 1` (may equal the origin)
    pub destination_field: FieldId,
    #[serde(default)]
    pub condition: CarryCondition,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CarryOverRule {
    pub fn new(id: i64, origin: FieldId, destination: FieldId, condition: CarryCondition) -> Self {
        CarryOverRule {
            id,
            origin_field: origin,
            destination_field: destination,
            condition,
            is_active: true,
        }
    }

    /// Get a human-readable description of this rule
    pub fn describe(&self) -> String {
        format!(
            "carry({} -> next.{}) when {}",
            self.origin_field, self.destination_field, self.condition
        )
    }
}

/// Comparison operators usable in color rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    /// Whether this operator needs ordered (numeric) operands
    pub fn is_ordering(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }

    /// Apply the operator to an ordering of `left` relative to `right`
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering;
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "!="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
        }
    }
}

/// What a color rule paints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// A single cell
    #[default]
    #[serde(alias = "campo")]
    Field,
    /// The whole period row
    #[serde(alias = "riga")]
    Row,
}

/// Display style of a cell or row
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Style {
    /// Whether this is the neutral style (nothing set)
    pub fn is_neutral(&self) -> bool {
        *self == Style::default()
    }
}

/// Conditional-formatting rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRule {
    pub id: i64,
    #[serde(default, alias = "applica_a")]
    pub scope: RuleScope,
    /// Field compared; required for field scope, optional for row scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldId>,
    pub operator: CompareOp,
    pub comparison_value: String,
    #[serde(default)]
    pub style: Style,
    /// Higher wins when several rules match
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ColorRule {
    /// Create a field-scoped rule
    pub fn for_field(
        id: i64,
        field: FieldId,
        operator: CompareOp,
        comparison_value: impl Into<String>,
        style: Style,
    ) -> Self {
        ColorRule {
            id,
            scope: RuleScope::Field,
            field: Some(field),
            operator,
            comparison_value: comparison_value.into(),
            style,
            priority: 0,
            is_active: true,
        }
    }

    /// Create a row-scoped rule; `field: None` tests every field of the row
    pub fn for_row(
        id: i64,
        field: Option<FieldId>,
        operator: CompareOp,
        comparison_value: impl Into<String>,
        style: Style,
    ) -> Self {
        ColorRule {
            id,
            scope: RuleScope::Row,
            field,
            operator,
            comparison_value: comparison_value.into(),
            style,
            priority: 0,
            is_active: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Get a human-readable description of this rule
    pub fn describe(&self) -> String {
        let target = match (&self.scope, &self.field) {
            (RuleScope::Field, Some(field)) => field.to_string(),
            (RuleScope::Field, None) => "?".to_string(),
            (RuleScope::Row, Some(field)) => format!("row.{}", field),
            (RuleScope::Row, None) => "row.*".to_string(),
        };
        format!(
            "color({} {} {}) priority {}",
            target, self.operator, self.comparison_value, self.priority
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_carry_condition_zero_boundary() {
        let zero = Decimal::ZERO;
        assert!(CarryCondition::Always.holds(&zero));
        assert!(!CarryCondition::IfPositive.holds(&zero));
        assert!(!CarryCondition::IfNegative.holds(&zero));
        assert!(!CarryCondition::IfNonZero.holds(&zero));

        // Negative zero from arithmetic must not count as negative
        let neg_zero = dec("-0.00");
        assert!(!CarryCondition::IfNegative.holds(&neg_zero));
        assert!(!CarryCondition::IfPositive.holds(&neg_zero));
    }

    #[test]
    fn test_carry_condition_signs() {
        assert!(CarryCondition::IfPositive.holds(&dec("0.01")));
        assert!(!CarryCondition::IfPositive.holds(&dec("-5")));
        assert!(CarryCondition::IfNegative.holds(&dec("-5")));
        assert!(CarryCondition::IfNonZero.holds(&dec("-5")));
    }

    #[test]
    fn test_compare_op_serde_symbols() {
        let op: CompareOp = serde_json::from_str("\"<=\"").unwrap();
        assert_eq!(op, CompareOp::Le);
        let op: CompareOp = serde_json::from_str("\"==\"").unwrap();
        assert_eq!(op, CompareOp::Eq);
        assert_eq!(serde_json::to_string(&CompareOp::Ne).unwrap(), "\"!=\"");
    }

    #[test]
    fn test_rule_scope_accepts_persisted_tokens() {
        let rule: ColorRule = serde_json::from_value(serde_json::json!({
            "id": 3,
            "applica_a": "riga",
            "operator": "<",
            "comparison_value": "0",
            "style": { "background_color": "#fdd" }
        }))
        .unwrap();
        assert_eq!(rule.scope, RuleScope::Row);
        assert!(rule.is_active);
        assert_eq!(rule.describe(), "color(row.* < 0) priority 0");

        let scope: RuleScope = serde_json::from_str("\"campo\"").unwrap();
        assert_eq!(scope, RuleScope::Field);
    }

    #[test]
    fn test_carry_rule_describe() {
        let rule = CarryOverRule::new(
            1,
            FieldId::parse("Credito").unwrap(),
            FieldId::parse("Credito_Prec").unwrap(),
            CarryCondition::IfPositive,
        );
        assert_eq!(rule.describe(), "carry(Credito -> next.Credito_Prec) when > 0");
    }

    #[test]
    fn test_style_neutral() {
        assert!(Style::default().is_neutral());
        let bold = Style {
            bold: true,
            ..Style::default()
        };
        assert!(!bold.is_neutral());
    }
}
