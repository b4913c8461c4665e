//! Field definitions for runtime-defined activity schemas

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of a field inside an activity schema
///
/// Wraps the administrator-supplied field name. Comparison, ordering and
/// hashing are case-insensitive (formulas reference `[Credito]` and
/// `[CREDITO]` interchangeably) while `Display` keeps the original spelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldId {
    name: String,
    key: String,
}

/// Error when parsing a field name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIdError {
    /// Name is empty or only whitespace
    Empty,
    /// Name contains a bracket, which would break `[Name]` references
    Bracket { name: String },
}

impl std::fmt::Display for FieldIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldIdError::Empty => write!(f, "field name cannot be empty"),
            FieldIdError::Bracket { name } => {
                write!(f, "field name '{}' cannot contain '[' or ']'", name)
            }
        }
    }
}

impl std::error::Error for FieldIdError {}

impl FieldId {
    /// Parse and validate a field name
    pub fn parse(name: &str) -> Result<Self, FieldIdError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FieldIdError::Empty);
        }
        if name.contains('[') || name.contains(']') {
            return Err(FieldIdError::Bracket {
                name: name.to_string(),
            });
        }
        Ok(FieldId {
            name: name.to_string(),
            key: name.to_lowercase(),
        })
    }

    /// The name as the administrator typed it
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Case-folded lookup key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Case-insensitive comparison against a plain string
    pub fn matches(&self, other: &str) -> bool {
        self.key == other.trim().to_lowercase()
    }

    /// The reference token used inside formulas: `[Name]`
    pub fn reference(&self) -> String {
        format!("[{}]", self.name)
    }
}

impl PartialEq for FieldId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FieldId {}

impl Hash for FieldId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for FieldId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl TryFrom<&str> for FieldId {
    type Error = FieldIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        FieldId::parse(value)
    }
}

impl TryFrom<String> for FieldId {
    type Error = FieldIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldId::parse(&value)
    }
}

impl From<FieldId> for String {
    fn from(value: FieldId) -> Self {
        value.name
    }
}

/// Data type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Single-line text (default)
    #[default]
    Text,
    /// Multi-line text
    LongText,
    /// Whole number
    Number,
    /// Decimal amount
    Decimal,
    /// Calendar date
    Date,
    /// Yes/no flag
    Boolean,
    /// One of a fixed list of options
    Dropdown,
}

impl DataType {
    /// Get display label for UI
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Text => "Text",
            DataType::LongText => "Long text",
            DataType::Number => "Number",
            DataType::Decimal => "Decimal",
            DataType::Date => "Date",
            DataType::Boolean => "Yes/No",
            DataType::Dropdown => "Dropdown",
        }
    }

    /// Whether values of this type can take part in arithmetic and ordering
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Number | DataType::Decimal)
    }
}

/// Capability shared by every schema type whose fields may carry formulas
///
/// Plain activity fields and period-type fields both implement this, so the
/// formula validator and the dependency graph work against either.
pub trait SchemaField {
    fn field_id(&self) -> &FieldId;
    fn is_calculated(&self) -> bool;
    fn formula(&self) -> Option<&str>;
}

impl<T: SchemaField + ?Sized> SchemaField for &T {
    fn field_id(&self) -> &FieldId {
        (**self).field_id()
    }

    fn is_calculated(&self) -> bool {
        (**self).is_calculated()
    }

    fn formula(&self) -> Option<&str> {
        (**self).formula()
    }
}

fn default_true() -> bool {
    true
}

/// Definition of a single field of an activity or period type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Unique (case-insensitive) name, used inside formulas
    pub name: FieldId,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_true")]
    pub show_in_list: bool,
    #[serde(default)]
    pub is_filter: bool,
    /// Allowed values, only meaningful for dropdowns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    /// Column width hint for the grid, in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_width: Option<u16>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Formula of a calculated field; a field is calculated iff this is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default)]
    pub is_completion_indicator: bool,
    #[serde(default)]
    pub is_result_indicator: bool,
    /// Periods (1-based) in which the field is shown; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible_periods: Vec<u32>,
}

impl FieldDefinition {
    /// Create an active, user-entered field
    pub fn new(name: FieldId, data_type: DataType) -> Self {
        FieldDefinition {
            label: name.as_str().to_string(),
            name,
            data_type,
            is_required: false,
            show_in_list: true,
            is_filter: false,
            options: Vec::new(),
            default_value: None,
            display_order: 0,
            display_width: None,
            is_active: true,
            formula: None,
            is_completion_indicator: false,
            is_result_indicator: false,
            visible_periods: Vec::new(),
        }
    }

    /// Create a calculated decimal field
    pub fn calculated(name: FieldId, formula: impl Into<String>) -> Self {
        let mut field = FieldDefinition::new(name, DataType::Decimal);
        field.formula = Some(formula.into());
        field
    }

    pub fn with_order(mut self, display_order: i32) -> Self {
        self.display_order = display_order;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn completion_indicator(mut self) -> Self {
        self.is_completion_indicator = true;
        self
    }

    pub fn result_indicator(mut self) -> Self {
        self.is_result_indicator = true;
        self
    }

    pub fn visible_in(mut self, periods: Vec<u32>) -> Self {
        self.visible_periods = periods;
        self
    }

    /// Whether the field is shown (and computed) in the given period
    pub fn is_visible_in(&self, period: u32) -> bool {
        self.visible_periods.is_empty() || self.visible_periods.contains(&period)
    }
}

impl SchemaField for FieldDefinition {
    fn field_id(&self) -> &FieldId {
        &self.name
    }

    fn is_calculated(&self) -> bool {
        self.formula.is_some()
    }

    fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }
}

/// Sort fields the way the grid lists them: display order, then name
pub fn sort_for_display(fields: &mut [&FieldDefinition]) {
    fields.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_id_case_insensitive() {
        let a = FieldId::parse("Credito").unwrap();
        let b = FieldId::parse("CREDITO").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Credito");
        assert_eq!(b.key(), "credito");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_field_id_trims_and_rejects_invalid() {
        assert_eq!(FieldId::parse("  Saldo ").unwrap().as_str(), "Saldo");
        assert!(matches!(FieldId::parse("   "), Err(FieldIdError::Empty)));
        assert!(matches!(
            FieldId::parse("A[1]"),
            Err(FieldIdError::Bracket { .. })
        ));
    }

    #[test]
    fn test_field_id_serde_as_string() {
        let id = FieldId::parse("Debito").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Debito\"");

        let back: FieldId = serde_json::from_str("\"debito\"").unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<FieldId>("\"\"").is_err());
    }

    #[test]
    fn test_field_definition_defaults_from_json() {
        let field: FieldDefinition = serde_json::from_value(serde_json::json!({
            "name": "Imponibile",
            "data_type": "decimal"
        }))
        .unwrap();

        assert!(field.is_active);
        assert!(field.show_in_list);
        assert!(!field.is_calculated());
        assert_eq!(field.data_type, DataType::Decimal);
        assert!(field.is_visible_in(7));
    }

    #[test]
    fn test_calculated_field_capability() {
        let field = FieldDefinition::calculated(FieldId::parse("Iva").unwrap(), "[Imponibile] * 0.22");
        assert!(field.is_calculated());
        assert_eq!(field.formula(), Some("[Imponibile] * 0.22"));
        assert_eq!(field.field_id().as_str(), "Iva");
    }

    #[test]
    fn test_visible_periods() {
        let field = FieldDefinition::new(FieldId::parse("Acconto").unwrap(), DataType::Decimal)
            .visible_in(vec![6, 11]);
        assert!(field.is_visible_in(6));
        assert!(!field.is_visible_in(7));
    }

    #[test]
    fn test_sort_for_display() {
        let b = FieldDefinition::new(FieldId::parse("B").unwrap(), DataType::Text).with_order(1);
        let a = FieldDefinition::new(FieldId::parse("a").unwrap(), DataType::Text).with_order(1);
        let z = FieldDefinition::new(FieldId::parse("Z").unwrap(), DataType::Text).with_order(0);
        let mut fields = vec![&b, &a, &z];
        sort_for_display(&mut fields);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Z", "a", "B"]);
    }
}
