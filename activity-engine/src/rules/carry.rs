//! Carry-over of values into the next period

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::formula::NumberFormat;
use crate::schema::CarryOverRule;

/// What carry-over may do to a destination that already holds a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryPolicy {
    /// Write only into blank destinations or ones filled by an earlier carry
    #[default]
    PreserveManual,
    /// Always write, replacing manual edits (explicit re-trigger)
    Overwrite,
}

impl CarryPolicy {
    /// Whether the destination may be written under this policy
    pub fn allows(&self, current_raw: Option<&str>, was_carried: bool) -> bool {
        match self {
            CarryPolicy::Overwrite => true,
            CarryPolicy::PreserveManual => {
                was_carried || current_raw.is_none_or(|raw| raw.trim().is_empty())
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CarryPolicy::PreserveManual => "Preserve manual edits",
            CarryPolicy::Overwrite => "Overwrite",
        }
    }
}

impl std::str::FromStr for CarryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "preserve_manual" | "preserve" => Ok(CarryPolicy::PreserveManual),
            "overwrite" => Ok(CarryPolicy::Overwrite),
            other => Err(format!(
                "unknown carry policy '{}' (expected preserve_manual or overwrite)",
                other
            )),
        }
    }
}

/// Decide what a carry-over rule writes into the next period
///
/// Returns the new raw value for the destination field, or `None` when the
/// rule is inactive, its condition does not hold for `source_value`, or the
/// destination already holds exactly that value. The value is written
/// without trailing fractional zeros, so `100` carries as `"100"`.
pub fn apply_carry_over(
    rule: &CarryOverRule,
    source_value: &Decimal,
    current_destination_raw: Option<&str>,
    format: &NumberFormat,
) -> Option<String> {
    if !rule.is_active || !rule.condition.holds(source_value) {
        return None;
    }

    let value = format.format_plain(source_value);
    if current_destination_raw.map(str::trim) == Some(value.as_str()) {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CarryCondition, FieldId};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn rule(condition: CarryCondition) -> CarryOverRule {
        CarryOverRule::new(
            1,
            FieldId::parse("CREDITO").unwrap(),
            FieldId::parse("CREDITO_PREC").unwrap(),
            condition,
        )
    }

    #[test]
    fn test_positive_credit_carries() {
        let fmt = NumberFormat::default();
        assert_eq!(
            apply_carry_over(&rule(CarryCondition::IfPositive), &dec("100"), None, &fmt),
            Some("100".to_string())
        );
        assert_eq!(
            apply_carry_over(&rule(CarryCondition::IfPositive), &dec("-5"), None, &fmt),
            None
        );
    }

    #[test]
    fn test_zero_boundary() {
        let fmt = NumberFormat::default();
        let zero = Decimal::ZERO;
        assert_eq!(apply_carry_over(&rule(CarryCondition::IfPositive), &zero, None, &fmt), None);
        assert_eq!(apply_carry_over(&rule(CarryCondition::IfNegative), &zero, None, &fmt), None);
        assert_eq!(apply_carry_over(&rule(CarryCondition::IfNonZero), &zero, None, &fmt), None);
        assert_eq!(
            apply_carry_over(&rule(CarryCondition::Always), &zero, None, &fmt),
            Some("0".to_string())
        );
    }

    #[test]
    fn test_negative_and_fractional_values() {
        let fmt = NumberFormat::default();
        assert_eq!(
            apply_carry_over(&rule(CarryCondition::IfNegative), &dec("-12.345"), None, &fmt),
            Some("-12,35".to_string())
        );
        assert_eq!(
            apply_carry_over(&rule(CarryCondition::IfNonZero), &dec("0.5"), None, &fmt),
            Some("0,5".to_string())
        );
    }

    #[test]
    fn test_unchanged_destination_is_not_rewritten() {
        let fmt = NumberFormat::default();
        let r = rule(CarryCondition::Always);
        assert_eq!(apply_carry_over(&r, &dec("100"), Some("100"), &fmt), None);
        assert_eq!(
            apply_carry_over(&r, &dec("100"), Some("90"), &fmt),
            Some("100".to_string())
        );
    }

    #[test]
    fn test_inactive_rule() {
        let mut r = rule(CarryCondition::Always);
        r.is_active = false;
        assert_eq!(apply_carry_over(&r, &dec("1"), None, &NumberFormat::default()), None);
    }

    #[test]
    fn test_policy() {
        assert!(CarryPolicy::PreserveManual.allows(None, false));
        assert!(CarryPolicy::PreserveManual.allows(Some(" "), false));
        assert!(CarryPolicy::PreserveManual.allows(Some("100"), true));
        assert!(!CarryPolicy::PreserveManual.allows(Some("80"), false));
        assert!(CarryPolicy::Overwrite.allows(Some("80"), false));
        assert_eq!("overwrite".parse::<CarryPolicy>(), Ok(CarryPolicy::Overwrite));
        assert_eq!(
            "Preserve-Manual".parse::<CarryPolicy>(),
            Ok(CarryPolicy::PreserveManual)
        );
        assert!("sometimes".parse::<CarryPolicy>().is_err());
    }
}
