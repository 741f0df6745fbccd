use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "thela",
    about = "Thela: assignment and fulfillment workflow for mobile food carts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service over a data directory
    Serve {
        /// Path to the TOML service config
        #[arg(long, default_value = "thela.toml")]
        config: String,
    },

    /// Write sample fixtures into a data directory
    Seed {
        /// Data directory receiving JSONL snapshots
        #[arg(long, default_value = ".thela")]
        data_dir: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a scripted allocation and fulfillment cycle in memory
    Demo {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
