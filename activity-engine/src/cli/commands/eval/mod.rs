pub mod handler;

pub use handler::handle_eval_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct EvalCommands {
    /// Formula to evaluate, e.g. "[Versato] - [Dovuto]"
    pub formula: String,

    /// Field value as NAME=VALUE (repeatable)
    #[arg(long = "value", value_name = "NAME=VALUE")]
    pub values: Vec<String>,

    /// Check field references against an activity of this schema catalog
    #[arg(short, long, value_name = "PATH", requires = "activity")]
    pub fields: Option<PathBuf>,

    /// Activity id or name used with --fields
    #[arg(short, long, requires = "fields")]
    pub activity: Option<String>,
}
