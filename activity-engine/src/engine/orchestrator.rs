//! Orchestrator - computes a client record into a grid
//!
//! For every period in range, in ascending order:
//! 1. build the period view from raw values and field defaults
//! 2. evaluate calculated fields in dependency order
//! 3. carry values into the next period's raw values
//! 4. resolve styles and completeness for the grid row

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use super::compiled::{CompiledSchema, Step};
use super::grid::{Badge, BadgeColor, Cell, CellError, Column, Grid, PeriodRow};
use crate::config::EngineConfig;
use crate::formula::{FormulaError, NumberFormat, Operand, ValueSource, parse_decimal};
use crate::rules::{apply_carry_over, resolve_field_style, resolve_row_style};
use crate::schema::{Activity, FieldDefinition, FieldId, SchemaField, Style};
use crate::store::{ClientRecord, PeriodValues, RecordKey, StoreError, Value, ValueStore};

/// Periods to compute, 1-based and inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodRange {
    pub from: u32,
    /// `None` runs to the last period of the layout
    pub to: Option<u32>,
}

impl PeriodRange {
    pub fn all() -> Self {
        PeriodRange { from: 1, to: None }
    }

    pub fn new(from: u32, to: u32) -> Self {
        PeriodRange { from, to: Some(to) }
    }

    pub fn single(period: u32) -> Self {
        Self::new(period, period)
    }

    /// Clamp to a layout with `period_count` periods
    pub fn bounds(&self, period_count: u32) -> RangeInclusive<u32> {
        let to = self.to.unwrap_or(period_count).min(period_count);
        self.from.max(1)..=to
    }
}

/// A value written (or withdrawn) by a carry-over rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarryEvent {
    pub rule_id: i64,
    pub from_period: u32,
    pub to_period: u32,
    pub field: FieldId,
    /// New raw value; `None` when an earlier carried value was withdrawn
    /// because the condition no longer holds
    pub value: Option<String>,
}

/// Result of computing a client record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Computation {
    pub grid: Grid,
    /// Updated snapshot for the store to save
    pub record: ClientRecord,
    pub carried: Vec<CarryEvent>,
}

/// Values formulas see while a period is computed
struct PeriodView {
    raw: BTreeMap<FieldId, String>,
    computed: BTreeMap<FieldId, Decimal>,
    invalid: BTreeMap<FieldId, CellError>,
}

impl ValueSource for PeriodView {
    fn resolve(&self, field: &FieldId) -> Operand<'_> {
        if let Some(value) = self.computed.get(field) {
            return Operand::Number(*value);
        }
        self.raw
            .get(field)
            .map(|raw| Operand::from_raw(raw))
            .unwrap_or(Operand::Missing)
    }
}

impl PeriodView {
    /// Raw values of non-calculated fields, defaults filling blanks
    fn build(fields: &[FieldDefinition], values: Option<&PeriodValues>) -> Self {
        let mut view = PeriodView {
            raw: BTreeMap::new(),
            computed: BTreeMap::new(),
            invalid: BTreeMap::new(),
        };

        for field in fields.iter().filter(|f| !f.is_calculated()) {
            let raw = values
                .and_then(|v| v.raw(&field.name))
                .or(field.default_value.as_deref());
            let Some(raw) = raw else { continue };

            match Value::parse(field, raw) {
                Ok(Some(_)) => {
                    view.raw.insert(field.name.clone(), raw.to_string());
                }
                Ok(None) => {}
                Err(e) => {
                    view.invalid
                        .insert(field.name.clone(), CellError::InvalidValue(e));
                }
            }
        }

        view
    }

    /// Effective value of a field: computed for calculated fields, raw otherwise
    fn effective(&self, field: &FieldDefinition, values: &PeriodValues) -> Option<String> {
        if field.is_calculated() {
            values.computed(&field.name).map(String::from)
        } else {
            self.raw.get(&field.name).cloned()
        }
    }
}

/// Drives computation of client records against one compiled schema
#[derive(Debug, Clone)]
pub struct Orchestrator {
    schema: CompiledSchema,
}

impl Orchestrator {
    pub fn new(activity: &Activity, config: &EngineConfig) -> Self {
        Self::from_compiled(CompiledSchema::compile(activity, config))
    }

    pub fn from_compiled(schema: CompiledSchema) -> Self {
        Orchestrator { schema }
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Compute every period of `range` for `record`
    ///
    /// The input record is left untouched; the updated snapshot is returned
    /// in the computation together with the grid.
    pub fn compute(&self, record: &ClientRecord, range: PeriodRange) -> Computation {
        let activity = self.schema.activity();
        let config = self.schema.config();
        let period_count = activity.period_count();

        if record.activity_id != activity.id {
            warn!(
                "Computing record of activity {} against schema of activity {}",
                record.activity_id, activity.id
            );
        }

        let mut working = record.clone();
        let mut rows = Vec::new();
        let mut carried = Vec::new();

        for period in range.bounds(period_count) {
            debug!(
                "Computing client {} activity {} period {}",
                record.client_id, activity.id, period
            );

            let mut view = PeriodView::build(self.schema.fields(), working.period(period));
            let failures = self.evaluate(period, &mut view);

            let values = working.period_mut(period);
            values.computed = view
                .computed
                .iter()
                .map(|(id, v)| (id.clone(), config.number_format.format(v)))
                .collect();
            let values = values.clone();

            if period < period_count {
                carried.extend(self.carry(period, &view, &failures, working.period_mut(period + 1)));
            } else if activity.carry_over_rules().iter().any(|r| r.is_active) {
                debug!("Period {} is the last one, nothing to carry into", period);
            }

            rows.push(self.build_row(period, &view, &failures, &values));
        }

        let grid = self.build_grid(&working, rows);
        Computation {
            grid,
            record: working,
            carried,
        }
    }

    /// Evaluate calculated fields visible in `period`, filling `view.computed`
    fn evaluate(&self, period: u32, view: &mut PeriodView) -> BTreeMap<FieldId, FormulaError> {
        let format = &self.schema.config().number_format;
        let mut failures: BTreeMap<FieldId, FormulaError> = BTreeMap::new();

        for planned in self.schema.plan() {
            let visible = self
                .schema
                .field(&planned.field)
                .is_some_and(|f| f.is_visible_in(period));
            if !visible {
                continue;
            }

            let result = match &planned.step {
                Step::Fail(e) => Err(e.clone()),
                Step::Evaluate(formula) => {
                    let failed_dependency = self
                        .schema
                        .graph()
                        .dependencies(&planned.field)
                        .into_iter()
                        .find(|d| failures.contains_key(*d));
                    match failed_dependency {
                        Some(dep) => Err(FormulaError::DependencyFailed {
                            field: dep.to_string(),
                        }),
                        None => formula.evaluate(&*view),
                    }
                }
            };

            match result {
                Ok(value) => {
                    view.computed.insert(planned.field.clone(), format.round(&value));
                }
                Err(e) => {
                    debug!("Period {}: '{}' failed: {}", period, planned.field, e);
                    failures.insert(planned.field.clone(), e);
                }
            }
        }

        failures
    }

    /// Apply carry-over rules from `period` into the next period's values
    fn carry(
        &self,
        period: u32,
        view: &PeriodView,
        failures: &BTreeMap<FieldId, FormulaError>,
        next: &mut PeriodValues,
    ) -> Vec<CarryEvent> {
        let config = self.schema.config();
        let mut events = Vec::new();

        for rule in self.schema.activity().carry_over_rules().iter().filter(|r| r.is_active) {
            let origin = &rule.origin_field;
            let destination = &rule.destination_field;

            let source = if let Some(e) = failures.get(origin) {
                warn!(
                    "Skipping carry rule {} from period {}: '{}' has an error: {}",
                    rule.id, period, origin, e
                );
                continue;
            } else if let Some(value) = view.computed.get(origin) {
                Some(*value)
            } else {
                view.raw.get(origin).and_then(|raw| {
                    let parsed = parse_decimal(raw);
                    if parsed.is_none() {
                        warn!(
                            "Carry rule {} from period {}: '{}' is not numeric ('{}')",
                            rule.id, period, origin, raw
                        );
                    }
                    parsed
                })
            };

            let was_carried = next.is_carried(destination);
            // A blank or non-numeric origin counts as a failed condition
            let Some(source) = source.filter(|v| rule.condition.holds(v)) else {
                if was_carried {
                    next.raw.remove(destination);
                    next.carried.remove(destination);
                    events.push(CarryEvent {
                        rule_id: rule.id,
                        from_period: period,
                        to_period: next.period,
                        field: destination.clone(),
                        value: None,
                    });
                }
                continue;
            };

            let current = next.raw(destination);
            if !config.carry_policy.allows(current, was_carried) {
                debug!(
                    "Carry rule {} keeps manual value of '{}' in period {}",
                    rule.id, destination, next.period
                );
                continue;
            }

            if let Some(value) = apply_carry_over(rule, &source, current, &config.number_format) {
                next.set_carried(destination.clone(), value.clone());
                events.push(CarryEvent {
                    rule_id: rule.id,
                    from_period: period,
                    to_period: next.period,
                    field: destination.clone(),
                    value: Some(value),
                });
            }
        }

        events
    }

    fn build_row(
        &self,
        period: u32,
        view: &PeriodView,
        failures: &BTreeMap<FieldId, FormulaError>,
        values: &PeriodValues,
    ) -> PeriodRow {
        let activity = self.schema.activity();
        let rules = activity.color_rules();

        let mut snapshot: BTreeMap<FieldId, String> = BTreeMap::new();
        let mut cells = Vec::new();

        for field in self.schema.fields().iter().filter(|f| f.is_visible_in(period)) {
            let effective = view.effective(field, values);
            let error = if field.is_calculated() {
                failures.get(&field.name).cloned().map(CellError::Formula)
            } else {
                view.invalid.get(&field.name).cloned()
            };

            let style = match (&effective, &error) {
                (Some(value), None) => resolve_field_style(rules, &field.name, value),
                _ => Style::default(),
            };
            if let Some(value) = &effective {
                snapshot.insert(field.name.clone(), value.clone());
            }

            cells.push(Cell {
                field: field.name.clone(),
                raw: if field.is_calculated() {
                    None
                } else {
                    values.raw(&field.name).map(String::from)
                },
                computed: values.computed(&field.name).map(String::from),
                style,
                error,
                missing_required: field.is_required && !field.is_calculated() && effective.is_none(),
                carried: values.is_carried(&field.name),
            });
        }

        let complete = match activity.completion_field() {
            Some(field) if field.is_calculated() => view.effective(field, values).is_some(),
            // A default does not complete a period, only user input does
            Some(field) => {
                values.raw(&field.name).is_some() && !view.invalid.contains_key(&field.name)
            }
            None => !values.raw.values().all(|v| v.trim().is_empty()),
        };

        PeriodRow {
            period,
            label: activity.period_label(period),
            cells,
            style: resolve_row_style(rules, &snapshot),
            complete,
        }
    }

    fn build_grid(&self, record: &ClientRecord, rows: Vec<PeriodRow>) -> Grid {
        let activity = self.schema.activity();
        let format = &self.schema.config().number_format;

        let columns = self
            .schema
            .fields()
            .iter()
            .map(|f| Column {
                field: f.name.clone(),
                label: if f.label.is_empty() {
                    f.name.to_string()
                } else {
                    f.label.clone()
                },
                data_type: f.data_type,
                calculated: f.is_calculated(),
                width: f.display_width,
            })
            .collect();

        let totals = activity
            .period_type()
            .filter(|p| p.show_totals)
            .map(|_| self.totals(&rows, format));

        let badge = self.badge(&rows);

        Grid {
            activity_id: activity.id,
            activity: activity.name.clone(),
            client_id: record.client_id,
            fiscal_year: record.fiscal_year,
            columns,
            rows,
            totals,
            badge,
        }
    }

    /// Sum numeric columns over the computed rows
    fn totals(&self, rows: &[PeriodRow], format: &NumberFormat) -> BTreeMap<FieldId, String> {
        self.schema
            .fields()
            .iter()
            .filter(|f| f.is_calculated() || f.data_type.is_numeric())
            .map(|f| {
                let sum = rows
                    .iter()
                    .filter_map(|r| r.cell(&f.name))
                    .filter(|c| c.error.is_none())
                    .filter_map(|c| c.computed.as_deref().or(c.raw.as_deref()))
                    .filter_map(parse_decimal)
                    .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v));
                (f.name.clone(), format.format(&sum))
            })
            .collect()
    }

    /// Result field of the latest complete period, green when >= 0
    fn badge(&self, rows: &[PeriodRow]) -> Option<Badge> {
        let result_field = self.schema.activity().result_field()?;
        let row = rows.iter().rev().find(|r| r.complete)?;
        let cell = row.cell(&result_field.name)?;
        if cell.error.is_some() {
            return None;
        }
        let value = cell.computed.as_deref().or(cell.raw.as_deref())?;
        let number = parse_decimal(value)?;

        Some(Badge {
            period: row.period,
            field: result_field.name.clone(),
            value: value.to_string(),
            color: if number.is_sign_negative() && !number.is_zero() {
                BadgeColor::Red
            } else {
                BadgeColor::Green
            },
        })
    }
}

/// Load a record, compute it and save the result in one step
///
/// Fails with [`StoreError::StaleWrite`] when the record changed between
/// load and save; the caller may retry with a fresh snapshot.
pub fn recompute<S: ValueStore + ?Sized>(
    store: &S,
    orchestrator: &Orchestrator,
    key: &RecordKey,
    range: PeriodRange,
) -> Result<Computation, StoreError> {
    let snapshot = store.load(key)?;
    let mut computation = orchestrator.compute(&snapshot, range);
    let version = store.save(computation.record.clone(), snapshot.version)?;
    computation.record.version = version;
    Ok(computation)
}
