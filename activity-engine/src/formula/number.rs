//! Locale-tolerant decimal parsing and formatting

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Parse a user-entered number accepting `,` or `.` as decimal separator
///
/// When both separators appear, the right-most one is the decimal separator
/// and the other is treated as a grouping mark (`1.234,56` and `1,234.56`
/// both read as 1234.56). A separator repeated with no other separator
/// present is a grouping mark too (`1.234.567`). Blank input is `None`.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    let s: String = input.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }

    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            let (decimal, grouping) = if c > d { (',', '.') } else { ('.', ',') };
            s.replace(grouping, "").replace(decimal, ".")
        }
        (Some(_), None) if s.matches(',').count() > 1 => s.replace(',', ""),
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.replace(',', "."),
    };

    if !normalized
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
    {
        return None;
    }

    normalized.parse::<Decimal>().ok()
}

/// How computed numbers are written back as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub fraction_digits: u32,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: ',',
            fraction_digits: 2,
        }
    }
}

impl NumberFormat {
    pub fn new(decimal_separator: char, fraction_digits: u32) -> Self {
        Self {
            decimal_separator,
            fraction_digits,
        }
    }

    /// Round half away from zero to the configured fraction digits
    pub fn round(&self, value: &Decimal) -> Decimal {
        let rounded =
            value.round_dp_with_strategy(self.fraction_digits, RoundingStrategy::MidpointAwayFromZero);
        // Avoid printing "-0,00"
        if rounded.is_zero() {
            Decimal::ZERO
        } else {
            rounded
        }
    }

    /// Format with exactly `fraction_digits` digits and no grouping
    pub fn format(&self, value: &Decimal) -> String {
        let rounded = self.round(value);
        let text = format!("{:.*}", self.fraction_digits as usize, rounded);
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }

    /// Like `format`, without trailing fractional zeros (`100`, `12,5`)
    ///
    /// Used for values written back into raw input, where they should read
    /// as if a user had typed them.
    pub fn format_plain(&self, value: &Decimal) -> String {
        let text = self.round(value).normalize().to_string();
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_both_separators() {
        assert_eq!(parse_decimal("10,50"), Some(dec("10.50")));
        assert_eq!(parse_decimal("10.50"), Some(dec("10.50")));
        assert_eq!(parse_decimal(" -3 "), Some(dec("-3")));
    }

    #[test]
    fn test_parse_grouping() {
        assert_eq!(parse_decimal("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_decimal("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_decimal("1.234.567"), Some(dec("1234567")));
        assert_eq!(parse_decimal("1 234,5"), Some(dec("1234.5")));
    }

    #[test]
    fn test_parse_rejects_text() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("1e5"), None);
        assert_eq!(parse_decimal("12-3"), None);
    }

    #[test]
    fn test_format_two_digits_comma() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.format(&dec("15.5")), "15,50");
        assert_eq!(fmt.format(&dec("2.005")), "2,01");
        assert_eq!(fmt.format(&dec("-2.005")), "-2,01");
        assert_eq!(fmt.format(&dec("-0.001")), "0,00");
        assert_eq!(fmt.format(&dec("100")), "100,00");
    }

    #[test]
    fn test_format_plain() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.format_plain(&dec("100.00")), "100");
        assert_eq!(fmt.format_plain(&dec("12.504")), "12,5");
        assert_eq!(fmt.format_plain(&dec("-0.001")), "0");
    }

    #[test]
    fn test_format_dot_and_precision() {
        let fmt = NumberFormat::new('.', 3);
        assert_eq!(fmt.format(&dec("1.23456")), "1.235");
        assert_eq!(fmt.format(&dec("7")), "7.000");
    }
}
