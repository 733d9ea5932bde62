//! litellm-sync binary entry point

use anyhow::Result;

mod api_key;
mod cli;
mod render;
mod sync;

use clap::Parser;
use cli::{Cli, Commands};
use litellm_sync::Settings;
use tracing_subscriber::EnvFilter;

/// Log filter from `RUST_LOG` directives, `info` when unset or invalid
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Variables already set in the environment win over the file
    match dotenvy::from_filename(&cli.env_file) {
        Ok(path) => tracing::debug!("Loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load {}: {}", cli.env_file.display(), e),
    }

    match cli.command {
        Commands::Sync {
            config,
            only,
            force,
            prune,
            replace_existing,
            format,
        } => {
            let settings = Settings::from_env()?;
            let args = sync::SyncArgs {
                config: &config,
                only,
                force,
                prune,
                replace_existing,
                format,
            };
            sync::run(&settings, args).await?;
        }
        Commands::Render { config, output } => {
            render::run(&config, output.as_deref())?;
        }
        Commands::CreateApiKey { email, alias } => {
            let settings = Settings::from_env()?;
            api_key::run(&settings, &email, alias.as_deref()).await?;
        }
    }

    Ok(())
}
