//! Command line interface

pub mod commands;

use std::fs;
use std::path::{Path, PathBuf};

use activity_engine::{EngineConfig, SchemaCatalog};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::compute::ComputeCommands;
use commands::eval::EvalCommands;
use commands::validate::ValidateCommands;

#[derive(Parser, Debug)]
#[command(name = "activity-engine", version)]
#[command(about = "Compute runtime-defined activities: formulas, carry-over and conditional styles")]
pub struct Cli {
    /// Engine config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log engine decisions (carry-over, failed cells) to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute client records and print the resulting grids
    Compute(ComputeCommands),
    /// Check activity schemas and report every issue found
    Validate(ValidateCommands),
    /// Evaluate a single formula
    Eval(EvalCommands),
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file does not exist: {}", path.display());
            }
            EngineConfig::load_from(path)
        }
        None => EngineConfig::load(),
    }
}

/// Read a schema catalog; `.json` files are parsed as JSON, anything else as TOML
pub fn load_catalog(path: &Path) -> Result<SchemaCatalog> {
    if !path.exists() {
        anyhow::bail!("Schema file does not exist: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;

    let catalog = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => SchemaCatalog::from_json_str(&content),
        _ => SchemaCatalog::from_toml_str(&content),
    }
    .with_context(|| format!("Failed to parse schema file: {}", path.display()))?;

    if catalog.is_empty() {
        anyhow::bail!("Schema file defines no activities: {}", path.display());
    }

    Ok(catalog)
}
