pub mod handler;

pub use handler::handle_validate_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommands {
    /// Schema catalog (TOML, or JSON with a .json extension)
    #[arg(short, long, value_name = "PATH")]
    pub schema: PathBuf,

    /// Only validate this activity (id or name)
    #[arg(short, long)]
    pub activity: Option<String>,

    /// Print issues as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
