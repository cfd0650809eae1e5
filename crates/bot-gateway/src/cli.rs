use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Multi-tenant conversational-AI orchestration gateway.
#[derive(Parser, Debug)]
#[command(name = "bot-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the runtime and block until a shutdown signal arrives.
    Serve {
        /// Path to a `config.toml` overlay. Defaults come from the
        /// embedded defaults, then this file, then `BOT_`-prefixed env vars.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
    /// Load and print the effective configuration, then exit.
    ShowConfig {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}
