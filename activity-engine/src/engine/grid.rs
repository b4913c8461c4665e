//! Materialized grid handed to the presentation layer

use std::collections::BTreeMap;

use serde::Serialize;

use crate::formula::FormulaError;
use crate::schema::{DataType, FieldId, Style};
use crate::store::ValueError;

/// Why a cell has no usable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "error", rename_all = "snake_case")]
pub enum CellError {
    /// The field's formula could not be evaluated
    Formula(FormulaError),
    /// The raw value does not fit the field's data type
    InvalidValue(ValueError),
}

impl CellError {
    /// Short marker rendered in place of the value
    pub fn marker(&self) -> &'static str {
        match self {
            CellError::Formula(e) => e.marker(),
            CellError::InvalidValue(_) => "#VALUE",
        }
    }
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellError::Formula(e) => write!(f, "{}", e),
            CellError::InvalidValue(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CellError {}

/// Column header of the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub field: FieldId,
    pub label: String,
    pub data_type: DataType,
    pub calculated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,
}

/// One field of one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub field: FieldId,
    /// Raw value as stored (after carry-over), if any
    pub raw: Option<String>,
    /// Formatted result of a calculated field
    pub computed: Option<String>,
    pub style: Style,
    pub error: Option<CellError>,
    /// Required field left blank
    pub missing_required: bool,
    /// Raw value written by carry-over
    pub carried: bool,
}

impl Cell {
    /// What the user sees: the error marker, the computed value or the raw one
    pub fn display_value(&self) -> &str {
        if let Some(error) = &self.error {
            return error.marker();
        }
        self.computed
            .as_deref()
            .or(self.raw.as_deref())
            .unwrap_or("")
    }
}

/// A period of the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRow {
    pub period: u32,
    pub label: String,
    pub cells: Vec<Cell>,
    /// Style from the winning row rule
    pub style: Style,
    pub complete: bool,
}

impl PeriodRow {
    pub fn cell(&self, field: &FieldId) -> Option<&Cell> {
        self.cells.iter().find(|c| &c.field == field)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.error.is_some())
    }
}

/// Sign of the headline result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Green,
    Red,
}

/// Headline badge of a client: the result field of the latest complete period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub period: u32,
    pub field: FieldId,
    pub value: String,
    pub color: BadgeColor,
}

/// Computed grid of a client record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub activity_id: i64,
    pub activity: String,
    pub client_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    pub columns: Vec<Column>,
    pub rows: Vec<PeriodRow>,
    /// Column sums over the rows, when the layout asks for totals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<BTreeMap<FieldId, String>>,
    pub badge: Option<Badge>,
}

impl Grid {
    pub fn row(&self, period: u32) -> Option<&PeriodRow> {
        self.rows.iter().find(|r| r.period == period)
    }

    /// Number of cells holding an error
    pub fn error_count(&self) -> usize {
        self.rows.iter().map(|r| r.errors().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cell(raw: Option<&str>, computed: Option<&str>, error: Option<CellError>) -> Cell {
        Cell {
            field: FieldId::parse("Credito").unwrap(),
            raw: raw.map(String::from),
            computed: computed.map(String::from),
            style: Style::default(),
            error,
            missing_required: false,
            carried: false,
        }
    }

    #[test]
    fn test_display_value_precedence() {
        assert_eq!(cell(Some("5"), None, None).display_value(), "5");
        assert_eq!(cell(Some("5"), Some("7,00"), None).display_value(), "7,00");
        assert_eq!(
            cell(None, None, Some(CellError::Formula(FormulaError::DivisionByZero))).display_value(),
            "#DIV/0"
        );
        assert_eq!(cell(None, None, None).display_value(), "");
    }

    #[test]
    fn test_cell_error_serialization() {
        let error = CellError::Formula(FormulaError::DivisionByZero);
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"source": "formula", "error": {"kind": "division_by_zero"}})
        );

        let error = CellError::InvalidValue(ValueError::NotANumber { raw: "x".into() });
        assert_eq!(error.marker(), "#VALUE");
        assert_eq!(error.to_string(), "'x' is not a number");
    }
}
