//! Validate command handler

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use super::ValidateCommands;
use activity_engine::EngineConfig;
use activity_engine::schema::{Activity, SchemaIssue, Severity};

#[derive(Serialize)]
struct IssueReport<'a> {
    activity_id: i64,
    activity: &'a str,
    #[serde(flatten)]
    issue: &'a SchemaIssue,
}

/// Handle the validate command; fails when any activity has blocking issues
pub fn handle_validate_command(args: ValidateCommands, _config: EngineConfig) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let catalog = crate::cli::load_catalog(&args.schema)?;

    let activities: Vec<&Activity> = match &args.activity {
        Some(selector) => vec![
            catalog
                .find(selector)
                .ok_or_else(|| anyhow::anyhow!("Unknown activity: {}", selector))?,
        ],
        None => catalog.iter().collect(),
    };

    let issues: Vec<(&Activity, SchemaIssue)> = activities
        .iter()
        .flat_map(|activity| activity.validate().into_iter().map(move |issue| (*activity, issue)))
        .collect();

    if args.json {
        let reports: Vec<IssueReport> = issues
            .iter()
            .map(|(activity, issue)| IssueReport {
                activity_id: activity.id,
                activity: &activity.name,
                issue,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to format JSON output")?
        );
    } else {
        for activity in &activities {
            let own: Vec<&SchemaIssue> = issues
                .iter()
                .filter(|(a, _)| a.id == activity.id)
                .map(|(_, issue)| issue)
                .collect();

            let status = if own.iter().any(|i| i.is_error()) {
                "invalid".red().bold()
            } else if own.is_empty() {
                "ok".bright_green().bold()
            } else {
                "ok with warnings".yellow().bold()
            };
            println!("{} {} ({})", activity.id, activity.name.bold(), status);

            for issue in own {
                let severity = match issue.severity {
                    Severity::Error => "error".red(),
                    Severity::Warning => "warning".yellow(),
                };
                println!("  {} [{}] {}", severity, issue.subject.cyan(), issue.message);
            }
        }
    }

    let errors = issues.iter().filter(|(_, i)| i.is_error()).count();
    if errors > 0 {
        anyhow::bail!("{} schema error(s) found, the schema cannot be saved", errors);
    }

    Ok(())
}
