//! Period layout of periodic activities
//!
//! A period type splits a fiscal year into `period_count` buckets with their
//! own labels and date ranges. It also owns the fields and rules that apply
//! inside those buckets.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CarryOverRule, ColorRule, FieldDefinition, IssueKind, SchemaIssue};

const MONTH_LABELS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Periodic layout of an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodType {
    pub name: String,
    pub period_count: u32,
    pub period_labels: Vec<String>,
    #[serde(default)]
    pub period_start_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub period_end_dates: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate_default: Option<Decimal>,
    /// Show a totals row under the grid
    #[serde(default)]
    pub show_totals: bool,
    /// Show the interest column
    #[serde(default)]
    pub show_interest: bool,
    /// Render the grid collapsed until the user expands it
    #[serde(default)]
    pub collapsed_by_default: bool,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub carry_over_rules: Vec<CarryOverRule>,
    #[serde(default)]
    pub color_rules: Vec<ColorRule>,
}

/// Error when generating a standard layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedPeriodCount(pub u32);

impl std::fmt::Display for UnsupportedPeriodCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot split a year into {} periods (use 1, 2, 3, 4, 6 or 12)",
            self.0
        )
    }
}

impl std::error::Error for UnsupportedPeriodCount {}

impl PeriodType {
    /// Build a calendar-aligned layout for a fiscal year
    ///
    /// `period_count` must divide 12. Labels are month names for monthly
    /// layouts, `Q1..Q4` for quarters, `H1/H2` for halves, `T1..T3` for
    /// four-month terms, `B1..B6` for two-month terms and `Year` for one
    /// period.
    pub fn standard(
        name: impl Into<String>,
        period_count: u32,
        fiscal_year: i32,
    ) -> Result<Self, UnsupportedPeriodCount> {
        if period_count == 0 || 12 % period_count != 0 {
            return Err(UnsupportedPeriodCount(period_count));
        }
        let months_per_period = 12 / period_count;
        let year_start =
            NaiveDate::from_ymd_opt(fiscal_year, 1, 1).ok_or(UnsupportedPeriodCount(period_count))?;

        let mut labels = Vec::with_capacity(period_count as usize);
        let mut starts = Vec::with_capacity(period_count as usize);
        let mut ends = Vec::with_capacity(period_count as usize);

        for index in 0..period_count {
            let start = year_start
                .checked_add_months(Months::new(index * months_per_period))
                .ok_or(UnsupportedPeriodCount(period_count))?;
            let end = start
                .checked_add_months(Months::new(months_per_period))
                .and_then(|next| next.pred_opt())
                .ok_or(UnsupportedPeriodCount(period_count))?;

            let label = match period_count {
                12 => MONTH_LABELS[index as usize].to_string(),
                6 => format!("B{}", index + 1),
                4 => format!("Q{}", index + 1),
                3 => format!("T{}", index + 1),
                2 => format!("H{}", index + 1),
                _ => "Year".to_string(),
            };

            labels.push(label);
            starts.push(start);
            ends.push(end);
        }

        Ok(PeriodType {
            name: name.into(),
            period_count,
            period_labels: labels,
            period_start_dates: starts,
            period_end_dates: ends,
            interest_rate_default: None,
            show_totals: false,
            show_interest: false,
            collapsed_by_default: false,
            fields: Vec::new(),
            carry_over_rules: Vec::new(),
            color_rules: Vec::new(),
        })
    }

    /// Whether a 1-based period index exists in this layout
    pub fn has_period(&self, period: u32) -> bool {
        period >= 1 && period <= self.period_count
    }

    /// Label of a 1-based period, falling back to its number
    pub fn label(&self, period: u32) -> String {
        period
            .checked_sub(1)
            .and_then(|i| self.period_labels.get(i as usize))
            .cloned()
            .unwrap_or_else(|| format!("Period {}", period))
    }

    /// Find the period whose date range contains `date`
    pub fn period_for_date(&self, date: NaiveDate) -> Option<u32> {
        self.period_start_dates
            .iter()
            .zip(self.period_end_dates.iter())
            .position(|(start, end)| *start <= date && date <= *end)
            .map(|i| i as u32 + 1)
    }

    /// Fiscal year of the layout, taken from the first period's start date
    pub fn fiscal_year(&self) -> Option<i32> {
        self.period_start_dates.first().map(|d| d.year())
    }

    /// Check labels, date ranges and ordering
    pub fn validate(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let subject = format!("period type '{}'", self.name);

        if self.period_count == 0 {
            issues.push(SchemaIssue::error(
                IssueKind::PeriodLayout,
                &subject,
                "period count must be at least 1",
            ));
            return issues;
        }

        let count = self.period_count as usize;
        if self.period_labels.len() != count {
            issues.push(SchemaIssue::error(
                IssueKind::PeriodLayout,
                &subject,
                format!(
                    "{} labels for {} periods",
                    self.period_labels.len(),
                    count
                ),
            ));
        }

        // Dates are optional, but when present both lists must be complete
        let has_dates = !self.period_start_dates.is_empty() || !self.period_end_dates.is_empty();
        if !has_dates {
            return issues;
        }
        if self.period_start_dates.len() != count || self.period_end_dates.len() != count {
            issues.push(SchemaIssue::error(
                IssueKind::PeriodLayout,
                &subject,
                format!(
                    "{} start dates and {} end dates for {} periods",
                    self.period_start_dates.len(),
                    self.period_end_dates.len(),
                    count
                ),
            ));
            return issues;
        }

        let mut previous_end: Option<NaiveDate> = None;
        for (i, (start, end)) in self
            .period_start_dates
            .iter()
            .zip(self.period_end_dates.iter())
            .enumerate()
        {
            if start > end {
                issues.push(SchemaIssue::error(
                    IssueKind::PeriodLayout,
                    format!("period {}", i + 1),
                    format!("starts on {} after it ends on {}", start, end),
                ));
            }
            if let Some(prev) = previous_end {
                if *start <= prev {
                    issues.push(SchemaIssue::error(
                        IssueKind::PeriodLayout,
                        format!("period {}", i + 1),
                        format!("starts on {} before the previous period ends on {}", start, prev),
                    ));
                }
            }
            previous_end = Some(*end);
        }

        issues
    }
}
