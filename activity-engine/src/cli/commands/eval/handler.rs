//! Eval command handler

use anyhow::{Context, Result};
use colored::*;
use std::collections::HashMap;

use super::EvalCommands;
use activity_engine::EngineConfig;
use activity_engine::formula::{evaluate, validate};
use activity_engine::schema::FieldDefinition;

/// Handle the eval command
pub fn handle_eval_command(args: EvalCommands, config: EngineConfig) -> Result<()> {
    if args.formula.chars().count() > config.max_formula_length {
        anyhow::bail!(
            "Formula is longer than the configured limit of {} characters",
            config.max_formula_length
        );
    }

    if let (Some(schema), Some(selector)) = (&args.fields, &args.activity) {
        let catalog = crate::cli::load_catalog(schema)?;
        let activity = catalog
            .find(selector)
            .ok_or_else(|| anyhow::anyhow!("Unknown activity: {}", selector))?;
        let fields: Vec<&FieldDefinition> = activity.active_fields();
        validate(&args.formula, &fields)
            .with_context(|| format!("Formula is not valid for activity '{}'", activity.name))?;
    }

    let values = parse_values(&args.values)?;
    let result = evaluate(&args.formula, &values).context("Failed to evaluate formula")?;

    println!("{}", config.number_format.format(&result).bold());
    Ok(())
}

fn parse_values(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Expected NAME=VALUE, got '{}'", pair))?;
            let name = name.trim().trim_start_matches('[').trim_end_matches(']');
            if name.is_empty() {
                anyhow::bail!("Missing field name in '{}'", pair);
            }
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}
