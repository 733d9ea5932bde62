//! CLI definitions for litellm-sync

use clap::{Parser, Subcommand, ValueEnum};
use litellm_sync::Category;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "litellm-sync")]
#[command(about = "Sync credentials, models, aliases and fallbacks into a LiteLLM gateway", long_about = None)]
pub struct Cli {
    /// Dotenv file loaded before reading settings
    #[arg(long, global = true, default_value = ".env")]
    pub env_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Change set report format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diff the local configuration against the gateway and apply it
    Sync {
        /// Base configuration file; `<name>.local.<ext>` beside it overrides it
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Comma-separated categories: credentials, models, aliases, fallbacks
        #[arg(long, value_delimiter = ',')]
        only: Vec<Category>,

        /// Apply the changes (default is a dry run)
        #[arg(short, long)]
        force: bool,

        /// Delete remote entities that are not declared locally
        #[arg(long)]
        prune: bool,

        /// Update entities present on both sides even when they match
        #[arg(long)]
        replace_existing: bool,

        /// Output format for the change set
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Write the resolved desired state as JSON without contacting the gateway
    Render {
        /// Base configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Find or create a user by email and issue an API key
    CreateApiKey {
        /// User email address
        email: String,

        /// API key alias (default: email prefix)
        #[arg(short, long)]
        alias: Option<String>,
    },
}
