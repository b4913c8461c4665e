pub mod handler;

pub use handler::handle_compute_command;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ComputeCommands {
    /// Schema catalog (TOML, or JSON with a .json extension)
    #[arg(short, long, value_name = "PATH")]
    pub schema: PathBuf,

    /// Client records (JSON array)
    #[arg(long, value_name = "PATH")]
    pub values: PathBuf,

    /// Activity id or name
    #[arg(short, long)]
    pub activity: String,

    /// Only compute this client
    #[arg(short, long)]
    pub client: Option<i64>,

    /// Only compute records of this fiscal year
    #[arg(short, long)]
    pub year: Option<i32>,

    /// First period to compute
    #[arg(long, default_value_t = 1)]
    pub from: u32,

    /// Last period to compute (defaults to the last period of the layout)
    #[arg(long)]
    pub to: Option<u32>,

    /// Replace manually entered values when carrying over
    #[arg(long)]
    pub overwrite_carry: bool,

    /// Save updated records back into the values file
    #[arg(long)]
    pub write_back: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned grid with conditional styles
    Table,
    /// Pretty-printed grids and carry-over events
    Json,
    /// One line per client and period
    Csv,
}
