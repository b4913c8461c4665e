//! Schema validation findings

use serde::Serialize;

/// How serious a schema issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks saving the schema
    Error,
    /// Reported to the administrator, saving is allowed
    Warning,
}

/// Category of a schema issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateField,
    MissingOptions,
    InvalidDefault,
    InvalidFormula,
    UnknownRuleField,
    /// Carry rule the engine can never apply (calculated or non-numeric target)
    InvalidCarryRule,
    MissingDestinationPeriod,
    InvalidRuleComparison,
    DuplicateIndicator,
    PeriodLayout,
}

/// A single finding produced while validating an activity schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    /// What the issue is about (field name, rule id, period index)
    pub subject: String,
    pub message: String,
}

impl SchemaIssue {
    pub fn error(kind: IssueKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaIssue {
            severity: Severity::Error,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(kind: IssueKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaIssue {
            severity: Severity::Warning,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{} [{}]: {}", level, self.subject, self.message)
    }
}

/// True when none of the issues blocks a save
pub fn is_savable(issues: &[SchemaIssue]) -> bool {
    !issues.iter().any(SchemaIssue::is_error)
}
