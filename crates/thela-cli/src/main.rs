//! Thela CLI: the `thela` command.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => commands::serve::run(config),
        Commands::Seed { data_dir, json } => commands::seed::run(data_dir, json),
        Commands::Demo { json } => commands::demo::run(json),
    }
}
