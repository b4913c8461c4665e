//! Compute command handler

use anyhow::{Context, Result};
use colored::*;
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::{ComputeCommands, OutputFormat};
use activity_engine::engine::{
    BadgeColor, CarryEvent, Cell, Computation, Grid, Orchestrator, PeriodRange, recompute,
};
use activity_engine::rules::CarryPolicy;
use activity_engine::schema::Style;
use activity_engine::store::{ClientRecord, MemoryStore, RecordKey};
use activity_engine::EngineConfig;

/// One computed record as written by `--format json`
#[derive(Serialize)]
struct ComputeReport<'a> {
    grid: &'a Grid,
    carried: &'a [CarryEvent],
}

/// Handle the compute command
pub fn handle_compute_command(args: ComputeCommands, mut config: EngineConfig) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    if args.overwrite_carry {
        config.carry_policy = CarryPolicy::Overwrite;
    }

    if let Some(to) = args.to {
        if to < args.from {
            anyhow::bail!("--to ({}) must not be before --from ({})", to, args.from);
        }
    }

    let catalog = crate::cli::load_catalog(&args.schema)?;
    let activity = catalog
        .find(&args.activity)
        .ok_or_else(|| anyhow::anyhow!("Unknown activity: {}", args.activity))?;

    for issue in activity.validate() {
        warn!("Activity '{}': {}", activity.name, issue);
    }

    let records = read_records(&args.values)?;
    let store = MemoryStore::from_records(records);

    let keys: Vec<RecordKey> = store
        .records()?
        .iter()
        .map(ClientRecord::key)
        .filter(|k| k.activity_id == activity.id)
        .filter(|k| args.client.is_none_or(|c| k.client_id == c))
        .filter(|k| args.year.is_none_or(|y| k.fiscal_year == Some(y)))
        .collect();

    if keys.is_empty() {
        anyhow::bail!("No records of activity '{}' match the selection", activity.name);
    }

    let orchestrator = Orchestrator::new(activity, &config);
    let range = PeriodRange {
        from: args.from,
        to: args.to,
    };

    let mut computations = Vec::with_capacity(keys.len());
    for key in &keys {
        let computation = recompute(&store, &orchestrator, key, range)
            .with_context(|| format!("Failed to compute {}", key))?;
        info!(
            "Computed {}: {} carry-over event(s), {} cell error(s)",
            key,
            computation.carried.len(),
            computation.grid.error_count()
        );
        computations.push(computation);
    }

    if args.write_back {
        let json = serde_json::to_string_pretty(&store.records()?)
            .context("Failed to serialize records")?;
        fs::write(&args.values, json)
            .with_context(|| format!("Failed to write records to: {}", args.values.display()))?;
        info!("Saved {} record(s) to {}", keys.len(), args.values.display());
    }

    let formatted_output = format_output(&computations, args.format)?;

    if let Some(output_path) = args.output {
        fs::write(&output_path, &formatted_output)
            .with_context(|| format!("Failed to write output to: {}", output_path.display()))?;
        println!(
            "Results saved to: {}",
            output_path.display().to_string().bright_green()
        );
    } else {
        print!("{}", formatted_output);
    }

    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<ClientRecord>> {
    if !path.exists() {
        anyhow::bail!("Values file does not exist: {}", path.display());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read values file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse values file: {}", path.display()))
}

/// Format computed grids according to the requested output format
fn format_output(computations: &[Computation], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let reports: Vec<ComputeReport> = computations
                .iter()
                .map(|c| ComputeReport {
                    grid: &c.grid,
                    carried: &c.carried,
                })
                .collect();
            let mut json =
                serde_json::to_string_pretty(&reports).context("Failed to format JSON output")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Csv => grids_to_csv(computations.iter().map(|c| &c.grid)),
        OutputFormat::Table => Ok(computations
            .iter()
            .map(|c| render_table(&c.grid, &c.carried))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Flatten grids into CSV, one line per client and period
fn grids_to_csv<'a>(grids: impl Iterator<Item = &'a Grid>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header_written = false;

    for grid in grids {
        if !header_written {
            let mut header = vec![
                "client_id".to_string(),
                "fiscal_year".to_string(),
                "period".to_string(),
                "label".to_string(),
            ];
            header.extend(grid.columns.iter().map(|c| c.field.to_string()));
            writer.write_record(&header)?;
            header_written = true;
        }

        for row in &grid.rows {
            let mut line = vec![
                grid.client_id.to_string(),
                grid.fiscal_year.map(|y| y.to_string()).unwrap_or_default(),
                row.period.to_string(),
                row.label.clone(),
            ];
            line.extend(grid.columns.iter().map(|c| {
                row.cell(&c.field)
                    .map(|cell| cell.display_value().to_string())
                    .unwrap_or_default()
            }));
            writer.write_record(&line)?;
        }
    }

    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Render a grid as an aligned table with conditional styles applied
fn render_table(grid: &Grid, carried: &[CarryEvent]) -> String {
    let mut out = String::new();

    let title = match grid.fiscal_year {
        Some(year) => format!("{} - client {} - {}", grid.activity, grid.client_id, year),
        None => format!("{} - client {}", grid.activity, grid.client_id),
    };
    out.push_str(&format!("{}\n", title.bold()));

    let label_width = grid
        .rows
        .iter()
        .map(|r| r.label.chars().count())
        .max()
        .unwrap_or(0)
        .max("Period".len());

    let widths: Vec<usize> = grid
        .columns
        .iter()
        .map(|column| {
            let content = grid
                .rows
                .iter()
                .filter_map(|r| r.cell(&column.field))
                .map(|cell| cell_text(cell).chars().count())
                .max()
                .unwrap_or(0);
            let total = grid
                .totals
                .as_ref()
                .and_then(|t| t.get(&column.field))
                .map(|v| v.chars().count())
                .unwrap_or(0);
            column
                .label
                .chars()
                .count()
                .max(content)
                .max(total)
                .max(column.width.unwrap_or(0) as usize)
        })
        .collect();

    let mut header = format!("{:<label_width$}", "Period");
    for (column, width) in grid.columns.iter().zip(&widths) {
        header.push_str(&format!("  {:>width$}", column.label));
    }
    out.push_str(&format!("{}\n", header.underline()));

    for row in &grid.rows {
        let label = format!("{:<label_width$}", row.label);
        out.push_str(&paint(label, &row.style).to_string());

        for (column, width) in grid.columns.iter().zip(&widths) {
            out.push_str("  ");
            let Some(cell) = row.cell(&column.field) else {
                out.push_str(&" ".repeat(*width));
                continue;
            };
            let text = format!("{:>width$}", cell_text(cell));
            let painted = if cell.error.is_some() {
                text.red().bold()
            } else if cell.missing_required {
                text.yellow()
            } else if !cell.style.is_neutral() {
                paint(text, &cell.style)
            } else {
                paint(text, &row.style)
            };
            out.push_str(&painted.to_string());
        }

        if !row.complete {
            out.push_str(&format!("  {}", "(open)".dimmed()));
        }
        out.push('\n');
    }

    if let Some(totals) = &grid.totals {
        let mut line = format!("{:<label_width$}", "Total");
        for (column, width) in grid.columns.iter().zip(&widths) {
            let value = totals.get(&column.field).map(String::as_str).unwrap_or("");
            line.push_str(&format!("  {:>width$}", value));
        }
        out.push_str(&format!("{}\n", line.bold()));
    }

    for row in &grid.rows {
        for cell in row.errors() {
            if let Some(error) = &cell.error {
                out.push_str(&format!(
                    "{} {} {}: {}\n",
                    "!".red().bold(),
                    row.label,
                    cell.field,
                    error
                ));
            }
        }
    }

    for event in carried {
        let text = match &event.value {
            Some(value) => format!(
                "carried {} = {} from period {} into period {}",
                event.field, value, event.from_period, event.to_period
            ),
            None => format!(
                "withdrew carried {} from period {}",
                event.field, event.to_period
            ),
        };
        out.push_str(&format!("{}\n", text.dimmed()));
    }

    match &grid.badge {
        Some(badge) => {
            let text = format!("{} {} ({})", badge.field, badge.value, period_label(grid, badge.period));
            let text = match badge.color {
                BadgeColor::Green => text.green().bold(),
                BadgeColor::Red => text.red().bold(),
            };
            out.push_str(&format!("Result: {}\n", text));
        }
        None => out.push_str(&format!("Result: {}\n", "-".dimmed())),
    }

    out
}

fn period_label(grid: &Grid, period: u32) -> String {
    grid.row(period)
        .map(|r| r.label.clone())
        .unwrap_or_else(|| period.to_string())
}

/// Cell text with markers for carried values and missing required input
fn cell_text(cell: &Cell) -> String {
    if cell.missing_required {
        return "(required)".to_string();
    }
    let value = cell.display_value();
    if cell.carried {
        format!("{}*", value)
    } else {
        value.to_string()
    }
}

fn paint(text: String, style: &Style) -> ColoredString {
    let mut painted = ColoredString::from(text.as_str());
    if let Some(color) = &style.text_color {
        painted = painted.color(color.as_str());
    }
    if let Some(background) = &style.background_color {
        painted = painted.on_color(background.as_str());
    }
    if style.bold {
        painted = painted.bold();
    }
    painted
}
