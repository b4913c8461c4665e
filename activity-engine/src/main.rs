mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Compute(args) => cli::commands::compute::handle_compute_command(args, config),
        Commands::Validate(args) => cli::commands::validate::handle_validate_command(args, config),
        Commands::Eval(args) => cli::commands::eval::handle_eval_command(args, config),
    }
}
