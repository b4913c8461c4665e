//! Conditional formatting

use std::collections::BTreeMap;

use crate::formula::parse_decimal;
use crate::schema::{
    ColorRule, CompareOp, FieldDefinition, FieldId, IssueKind, RuleScope, SchemaField, SchemaIssue,
    Style,
};

/// Compare a value against a rule's comparison value
///
/// Numeric when both sides parse as decimals. Otherwise `=`/`!=` compare the
/// trimmed strings exactly and ordering operators never match.
pub fn compare(op: CompareOp, value: &str, comparison: &str) -> bool {
    match (parse_decimal(value), parse_decimal(comparison)) {
        (Some(left), Some(right)) => op.accepts(left.cmp(&right)),
        _ => match op {
            CompareOp::Eq => value.trim() == comparison.trim(),
            CompareOp::Ne => value.trim() != comparison.trim(),
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => false,
        },
    }
}

impl ColorRule {
    /// Whether this rule fires for a single value
    pub fn matches(&self, value: &str) -> bool {
        compare(self.operator, value, &self.comparison_value)
    }

    /// Whether this row-scoped rule fires for a row snapshot
    ///
    /// With a field named only that field is tested; otherwise any value in
    /// the row may match.
    pub fn matches_row(&self, row: &BTreeMap<FieldId, String>) -> bool {
        match &self.field {
            Some(field) => row.get(field).is_some_and(|v| self.matches(v)),
            None => row.values().any(|v| self.matches(v)),
        }
    }
}

/// Pick the winning rule: highest priority, then the last defined (highest id)
fn winner<'a>(matching: impl Iterator<Item = &'a ColorRule>) -> Option<&'a ColorRule> {
    matching.max_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)))
}

/// Style of a single cell; neutral when no active field rule matches
pub fn resolve_field_style(rules: &[ColorRule], field: &FieldId, value: &str) -> Style {
    winner(rules.iter().filter(|r| {
        r.is_active
            && r.scope == RuleScope::Field
            && r.field.as_ref() == Some(field)
            && r.matches(value)
    }))
    .map(|r| r.style.clone())
    .unwrap_or_default()
}

/// Style of a whole row; neutral when no active row rule matches
pub fn resolve_row_style(rules: &[ColorRule], row: &BTreeMap<FieldId, String>) -> Style {
    winner(
        rules
            .iter()
            .filter(|r| r.is_active && r.scope == RuleScope::Row && r.matches_row(row)),
    )
    .map(|r| r.style.clone())
    .unwrap_or_default()
}

/// Validate a color rule against the fields of its activity
pub fn check_color_rule(rule: &ColorRule, fields: &[FieldDefinition]) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    let subject = format!("color rule {}", rule.id);

    let target = match &rule.field {
        Some(name) => match fields.iter().find(|f| f.field_id() == name) {
            Some(field) => Some(field),
            None => {
                issues.push(SchemaIssue::error(
                    IssueKind::UnknownRuleField,
                    &subject,
                    format!("field '{}' does not exist", name),
                ));
                None
            }
        },
        None if rule.scope == RuleScope::Field => {
            issues.push(SchemaIssue::error(
                IssueKind::UnknownRuleField,
                &subject,
                "field-scoped rule does not name a field",
            ));
            None
        }
        None => None,
    };

    if rule.operator.is_ordering() {
        if parse_decimal(&rule.comparison_value).is_none() {
            issues.push(SchemaIssue::error(
                IssueKind::InvalidRuleComparison,
                &subject,
                format!(
                    "operator '{}' needs a numeric comparison value, got '{}'",
                    rule.operator, rule.comparison_value
                ),
            ));
        } else if let Some(field) = target.filter(|f| !f.is_calculated() && !f.data_type.is_numeric()) {
            issues.push(SchemaIssue::error(
                IssueKind::InvalidRuleComparison,
                &subject,
                format!(
                    "operator '{}' cannot compare {} field '{}'",
                    rule.operator,
                    field.data_type.label(),
                    field.name
                ),
            ));
        }
    }

    issues
}
