//! Typed field values, parsed from raw strings at the store boundary

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::formula::parse_decimal;
use crate::schema::{DataType, FieldDefinition};

/// A raw value interpreted according to its field's data type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Number(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Bool(bool),
}

/// Error when a raw string does not fit its field's data type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueError {
    NotANumber { raw: String },
    NotAnInteger { raw: String },
    NotADate { raw: String },
    NotABoolean { raw: String },
    /// Dropdown value outside the configured options
    NotAnOption { raw: String, options: Vec<String> },
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::NotANumber { raw } => write!(f, "'{}' is not a number", raw),
            ValueError::NotAnInteger { raw } => write!(f, "'{}' is not a whole number", raw),
            ValueError::NotADate { raw } => {
                write!(f, "'{}' is not a date (expected YYYY-MM-DD or DD/MM/YYYY)", raw)
            }
            ValueError::NotABoolean { raw } => write!(f, "'{}' is not a yes/no value", raw),
            ValueError::NotAnOption { raw, options } => {
                write!(f, "'{}' is not one of: {}", raw, options.join(", "))
            }
        }
    }
}

impl std::error::Error for ValueError {}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

impl Value {
    /// Parse a raw value for `field`
    ///
    /// Blank input is "no value" and yields `Ok(None)` for every data type.
    pub fn parse(field: &FieldDefinition, raw: &str) -> Result<Option<Value>, ValueError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let value = match field.data_type {
            DataType::Text | DataType::LongText => Value::Text(raw.to_string()),
            DataType::Dropdown => {
                if !field.options.is_empty() && !field.options.iter().any(|o| o == trimmed) {
                    return Err(ValueError::NotAnOption {
                        raw: trimmed.to_string(),
                        options: field.options.clone(),
                    });
                }
                Value::Text(trimmed.to_string())
            }
            DataType::Number => {
                let n = parse_decimal(trimmed).ok_or_else(|| ValueError::NotANumber {
                    raw: trimmed.to_string(),
                })?;
                if !n.fract().is_zero() {
                    return Err(ValueError::NotAnInteger {
                        raw: trimmed.to_string(),
                    });
                }
                Value::Number(n.to_i64().ok_or_else(|| ValueError::NotAnInteger {
                    raw: trimmed.to_string(),
                })?)
            }
            DataType::Decimal => Value::Decimal(parse_decimal(trimmed).ok_or_else(|| {
                ValueError::NotANumber {
                    raw: trimmed.to_string(),
                }
            })?),
            DataType::Date => Value::Date(parse_date(trimmed).ok_or_else(|| ValueError::NotADate {
                raw: trimmed.to_string(),
            })?),
            DataType::Boolean => Value::Bool(parse_bool(trimmed).ok_or_else(|| {
                ValueError::NotABoolean {
                    raw: trimmed.to_string(),
                }
            })?),
        };
        Ok(Some(value))
    }

    /// Numeric view of the value, if it has one
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(Decimal::from(*n)),
            Value::Decimal(d) => Some(*d),
            Value::Text(_) | Value::Date(_) | Value::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "si" | "sì" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldId;

    fn field(data_type: DataType) -> FieldDefinition {
        FieldDefinition::new(FieldId::parse("F").unwrap(), data_type)
    }

    #[test]
    fn test_blank_is_no_value() {
        for data_type in [DataType::Text, DataType::Decimal, DataType::Date, DataType::Boolean] {
            assert_eq!(Value::parse(&field(data_type), "  "), Ok(None));
        }
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(
            Value::parse(&field(DataType::Decimal), "1.234,5"),
            Ok(Some(Value::Decimal("1234.5".parse().unwrap())))
        );
        assert_eq!(Value::parse(&field(DataType::Number), "42"), Ok(Some(Value::Number(42))));
        assert_eq!(Value::parse(&field(DataType::Number), "42,00"), Ok(Some(Value::Number(42))));
        assert!(matches!(
            Value::parse(&field(DataType::Number), "4,5"),
            Err(ValueError::NotAnInteger { .. })
        ));
        assert!(matches!(
            Value::parse(&field(DataType::Decimal), "dieci"),
            Err(ValueError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_parse_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 16).unwrap();
        assert_eq!(
            Value::parse(&field(DataType::Date), "2025-03-16"),
            Ok(Some(Value::Date(expected)))
        );
        assert_eq!(
            Value::parse(&field(DataType::Date), "16/03/2025"),
            Ok(Some(Value::Date(expected)))
        );
        assert!(Value::parse(&field(DataType::Date), "31/02/2025").is_err());
    }

    #[test]
    fn test_parse_booleans() {
        let f = field(DataType::Boolean);
        for raw in ["true", "SI", "1", "on", "Yes"] {
            assert_eq!(Value::parse(&f, raw), Ok(Some(Value::Bool(true))), "{}", raw);
        }
        for raw in ["false", "no", "0", "OFF"] {
            assert_eq!(Value::parse(&f, raw), Ok(Some(Value::Bool(false))), "{}", raw);
        }
        assert!(Value::parse(&f, "forse").is_err());
    }

    #[test]
    fn test_dropdown_options() {
        let f = field(DataType::Dropdown).with_options(vec!["Artigiano".into(), "Professionista".into()]);
        assert_eq!(
            Value::parse(&f, "Artigiano"),
            Ok(Some(Value::Text("Artigiano".into())))
        );
        let err = Value::parse(&f, "Agricoltore").unwrap_err();
        assert_eq!(err.to_string(), "'Agricoltore' is not one of: Artigiano, Professionista");
    }

    #[test]
    fn test_as_decimal() {
        assert_eq!(Value::Number(3).as_decimal(), Some(Decimal::from(3)));
        assert_eq!(Value::Text("3".into()).as_decimal(), None);
    }
}
