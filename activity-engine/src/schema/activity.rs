//! Activity definitions: the unit a client is enrolled in

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::field::sort_for_display;
use super::{
    CarryOverRule, ColorRule, FieldDefinition, FieldId, IssueKind, PeriodType, SchemaField,
    SchemaIssue,
};
use crate::formula;
use crate::rules::check_color_rule;
use crate::store::Value;

/// Shape of an activity's data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityLayout {
    /// One record per client, no periods
    Plain {
        #[serde(default)]
        fields: Vec<FieldDefinition>,
        #[serde(default)]
        color_rules: Vec<ColorRule>,
    },
    /// One record per client and fiscal year, split into periods
    Periodic(PeriodType),
}

/// An administrator-defined schema clients can have records against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub layout: ActivityLayout,
}

impl Activity {
    pub fn plain(id: i64, name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Activity {
            id,
            name: name.into(),
            description: String::new(),
            layout: ActivityLayout::Plain {
                fields,
                color_rules: Vec::new(),
            },
        }
    }

    pub fn periodic(id: i64, name: impl Into<String>, period_type: PeriodType) -> Self {
        Activity {
            id,
            name: name.into(),
            description: String::new(),
            layout: ActivityLayout::Periodic(period_type),
        }
    }

    pub fn is_periodic(&self) -> bool {
        matches!(self.layout, ActivityLayout::Periodic(_))
    }

    pub fn period_type(&self) -> Option<&PeriodType> {
        match &self.layout {
            ActivityLayout::Periodic(period_type) => Some(period_type),
            ActivityLayout::Plain { .. } => None,
        }
    }

    /// Number of periods; a plain activity behaves as a single period
    pub fn period_count(&self) -> u32 {
        self.period_type().map(|p| p.period_count).unwrap_or(1)
    }

    pub fn period_label(&self, period: u32) -> String {
        match &self.layout {
            ActivityLayout::Periodic(period_type) => period_type.label(period),
            ActivityLayout::Plain { .. } => self.name.clone(),
        }
    }

    /// All field definitions, active or not, in definition order
    pub fn fields(&self) -> &[FieldDefinition] {
        match &self.layout {
            ActivityLayout::Plain { fields, .. } => fields,
            ActivityLayout::Periodic(period_type) => &period_type.fields,
        }
    }

    /// Active fields in display order
    pub fn active_fields(&self) -> Vec<&FieldDefinition> {
        let mut fields: Vec<&FieldDefinition> = self.fields().iter().filter(|f| f.is_active).collect();
        sort_for_display(&mut fields);
        fields
    }

    pub fn field(&self, id: &FieldId) -> Option<&FieldDefinition> {
        self.fields().iter().find(|f| &f.name == id)
    }

    pub fn color_rules(&self) -> &[ColorRule] {
        match &self.layout {
            ActivityLayout::Plain { color_rules, .. } => color_rules,
            ActivityLayout::Periodic(period_type) => &period_type.color_rules,
        }
    }

    /// Carry-over rules; always empty for plain activities
    pub fn carry_over_rules(&self) -> &[CarryOverRule] {
        match &self.layout {
            ActivityLayout::Plain { .. } => &[],
            ActivityLayout::Periodic(period_type) => &period_type.carry_over_rules,
        }
    }

    /// Field flagged as the completion indicator, if any
    pub fn completion_field(&self) -> Option<&FieldDefinition> {
        self.fields()
            .iter()
            .find(|f| f.is_active && f.is_completion_indicator)
    }

    /// Field flagged as the result indicator, if any
    pub fn result_field(&self) -> Option<&FieldDefinition> {
        self.fields().iter().find(|f| f.is_active && f.is_result_indicator)
    }

    /// Validate the whole schema
    ///
    /// An activity with any `Severity::Error` issue must not be saved.
    pub fn validate(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let fields = self.fields();

        if let Some(period_type) = self.period_type() {
            issues.extend(period_type.validate());
        }

        let mut seen: HashMap<&FieldId, usize> = HashMap::new();
        for field in fields {
            *seen.entry(&field.name).or_default() += 1;
        }
        let mut duplicates: Vec<&&FieldId> = seen
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(id, _)| id)
            .collect();
        duplicates.sort();
        for id in duplicates {
            issues.push(SchemaIssue::error(
                IssueKind::DuplicateField,
                id.as_str(),
                "field name is used more than once (names are case-insensitive)",
            ));
        }

        for field in fields {
            issues.extend(check_field(field, fields));
        }

        for (kind, count, label) in [
            (
                IssueKind::DuplicateIndicator,
                fields.iter().filter(|f| f.is_active && f.is_completion_indicator).count(),
                "completion",
            ),
            (
                IssueKind::DuplicateIndicator,
                fields.iter().filter(|f| f.is_active && f.is_result_indicator).count(),
                "result",
            ),
        ] {
            if count > 1 {
                issues.push(SchemaIssue::error(
                    kind,
                    &self.name,
                    format!("{} fields are flagged as the {} indicator", count, label),
                ));
            }
        }

        for rule in self.carry_over_rules() {
            issues.extend(self.check_carry_rule(rule));
        }

        for rule in self.color_rules() {
            issues.extend(check_color_rule(rule, fields));
        }

        issues
    }

    fn check_carry_rule(&self, rule: &CarryOverRule) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let subject = format!("carry rule {}", rule.id);

        for id in [&rule.origin_field, &rule.destination_field] {
            if self.field(id).is_none() {
                issues.push(SchemaIssue::error(
                    IssueKind::UnknownRuleField,
                    &subject,
                    format!("field '{}' does not exist", id),
                ));
            }
        }

        if let Some(destination) = self.field(&rule.destination_field) {
            if destination.is_calculated() {
                issues.push(SchemaIssue::error(
                    IssueKind::InvalidCarryRule,
                    &subject,
                    format!(
                        "destination '{}' is calculated, carried values would never be read",
                        destination.name
                    ),
                ));
            }
        }

        for (role, id) in [("origin", &rule.origin_field), ("destination", &rule.destination_field)] {
            let Some(field) = self.field(id) else { continue };
            if !field.is_calculated() && !field.data_type.is_numeric() {
                issues.push(SchemaIssue::error(
                    IssueKind::InvalidCarryRule,
                    &subject,
                    format!(
                        "{} '{}' is a {} field, only numeric fields can be carried",
                        role,
                        field.name,
                        field.data_type.label()
                    ),
                ));
            }
        }

        if rule.is_active && self.period_count() < 2 {
            issues.push(SchemaIssue::warning(
                IssueKind::MissingDestinationPeriod,
                &subject,
                "the layout has a single period, this rule can never write anything",
            ));
        }

        issues
    }
}

/// Per-field checks: options, default value, formula
fn check_field(field: &FieldDefinition, fields: &[FieldDefinition]) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    let subject = field.name.as_str();

    if field.data_type == super::DataType::Dropdown && field.options.is_empty() {
        issues.push(SchemaIssue::error(
            IssueKind::MissingOptions,
            subject,
            "dropdown field has no options",
        ));
    }

    if let Some(default) = &field.default_value {
        if let Err(e) = Value::parse(field, default) {
            issues.push(SchemaIssue::error(
                IssueKind::InvalidDefault,
                subject,
                format!("default value: {}", e),
            ));
        }
    }

    if let Some(source) = field.formula() {
        let available: Vec<&FieldDefinition> = fields
            .iter()
            .filter(|f| f.is_active && f.name != field.name)
            .collect();
        if let Err(e) = formula::validate(source, &available) {
            issues.push(SchemaIssue::error(IssueKind::InvalidFormula, subject, e.to_string()));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CarryCondition, CompareOp, DataType, Severity, Style};

    fn id(name: &str) -> FieldId {
        FieldId::parse(name).unwrap()
    }

    fn credit_schema() -> Activity {
        let mut layout = PeriodType::standard("Monthly", 12, 2025).unwrap();
        layout.fields = vec![
            FieldDefinition::new(id("Versato"), DataType::Decimal).with_order(1),
            FieldDefinition::new(id("Dovuto"), DataType::Decimal).with_order(2),
            FieldDefinition::new(id("Credito_Prec"), DataType::Decimal).with_order(3),
            FieldDefinition::calculated(id("Credito"), "[Versato] - [Dovuto] + [Credito_Prec]")
                .with_order(4)
                .result_indicator(),
        ];
        layout.carry_over_rules = vec![CarryOverRule::new(
            1,
            id("Credito"),
            id("Credito_Prec"),
            CarryCondition::IfPositive,
        )];
        Activity::periodic(7, "Crediti IVA", layout)
    }

    #[test]
    fn test_valid_schema_has_no_issues() {
        let activity = credit_schema();
        assert_eq!(activity.validate(), Vec::new());
        assert_eq!(activity.period_count(), 12);
        assert_eq!(activity.result_field().unwrap().name.as_str(), "Credito");
    }

    #[test]
    fn test_active_fields_sorted() {
        let mut activity = credit_schema();
        if let ActivityLayout::Periodic(p) = &mut activity.layout {
            p.fields[0].display_order = 9;
            p.fields[1].is_active = false;
        }
        let names: Vec<&str> = activity
            .active_fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Credito_Prec", "Credito", "Versato"]);
    }

    #[test]
    fn test_duplicate_field_names() {
        let activity = Activity::plain(
            1,
            "Anagrafica",
            vec![
                FieldDefinition::new(id("Nome"), DataType::Text),
                FieldDefinition::new(id("NOME"), DataType::Text),
            ],
        );
        let issues = activity.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DuplicateField);
    }

    #[test]
    fn test_formula_referencing_calculated_field_blocks_save() {
        let mut activity = credit_schema();
        if let ActivityLayout::Periodic(p) = &mut activity.layout {
            p.fields
                .push(FieldDefinition::calculated(id("Doppio"), "[Credito] * 2"));
        }
        let issues = activity.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::InvalidFormula);
        assert!(issues[0].message.contains("Credito"));
        assert!(!crate::schema::is_savable(&issues));
    }

    #[test]
    fn test_dropdown_and_default_checks() {
        let activity = Activity::plain(
            1,
            "Pratiche",
            vec![
                FieldDefinition::new(id("Stato"), DataType::Dropdown),
                FieldDefinition::new(id("Importo"), DataType::Decimal).with_default("abc"),
            ],
        );
        let kinds: Vec<IssueKind> = activity.validate().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::MissingOptions, IssueKind::InvalidDefault]);
    }

    #[test]
    fn test_carry_rule_checks() {
        let mut layout = PeriodType::standard("Annual", 1, 2025).unwrap();
        layout.fields = vec![FieldDefinition::new(id("Saldo"), DataType::Decimal)];
        layout.carry_over_rules = vec![CarryOverRule::new(
            4,
            id("Saldo"),
            id("Saldo_Iniziale"),
            CarryCondition::Always,
        )];
        let activity = Activity::periodic(2, "Saldi", layout);

        let issues = activity.validate();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::UnknownRuleField);
        assert_eq!(issues[1].kind, IssueKind::MissingDestinationPeriod);
        assert_eq!(issues[1].severity, Severity::Warning);
    }

    #[test]
    fn test_carry_rule_targets_must_be_numeric_raw_fields() {
        let mut layout = PeriodType::standard("Quarterly", 4, 2025).unwrap();
        layout.fields = vec![
            FieldDefinition::new(id("Saldo"), DataType::Decimal),
            FieldDefinition::new(id("Note"), DataType::Text),
            FieldDefinition::calculated(id("Doppio"), "[Saldo] * 2"),
        ];
        layout.carry_over_rules = vec![
            CarryOverRule::new(1, id("Saldo"), id("Doppio"), CarryCondition::Always),
            CarryOverRule::new(2, id("Note"), id("Saldo"), CarryCondition::Always),
            CarryOverRule::new(3, id("Saldo"), id("Note"), CarryCondition::Always),
            CarryOverRule::new(4, id("Doppio"), id("Saldo"), CarryCondition::IfPositive),
        ];
        let activity = Activity::periodic(3, "Saldi", layout);

        let issues = activity.validate();
        let subjects: Vec<&str> = issues.iter().map(|i| i.subject.as_str()).collect();
        assert_eq!(subjects, vec!["carry rule 1", "carry rule 2", "carry rule 3"]);
        assert!(issues.iter().all(|i| i.kind == IssueKind::InvalidCarryRule && i.is_error()));
        assert!(issues[1].message.contains("origin 'Note'"));
        assert!(issues[2].message.contains("destination 'Note'"));
    }

    #[test]
    fn test_duplicate_indicators() {
        let activity = Activity::plain(
            1,
            "Esiti",
            vec![
                FieldDefinition::new(id("A"), DataType::Decimal).result_indicator(),
                FieldDefinition::new(id("B"), DataType::Decimal).result_indicator(),
            ],
        );
        let issues = activity.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DuplicateIndicator);
        assert!(issues[0].message.contains("result"));
    }

    #[test]
    fn test_color_rule_checks_are_included() {
        let mut activity = credit_schema();
        if let ActivityLayout::Periodic(p) = &mut activity.layout {
            p.color_rules.push(ColorRule::for_field(
                1,
                id("Credito"),
                CompareOp::Gt,
                "molto",
                Style::default(),
            ));
        }
        let issues = activity.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::InvalidRuleComparison);
    }

    #[test]
    fn test_plain_layout_defaults() {
        let activity = Activity::plain(3, "Anagrafica", vec![]);
        assert!(!activity.is_periodic());
        assert_eq!(activity.period_count(), 1);
        assert_eq!(activity.period_label(1), "Anagrafica");
        assert!(activity.carry_over_rules().is_empty());
    }
}
