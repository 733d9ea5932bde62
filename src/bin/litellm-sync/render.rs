//! Render command implementation

use anyhow::{Context, Result};
use litellm_sync::{load_merged, DesiredState};
use std::path::Path;

/// Run the render command
pub fn run(config: &Path, output: Option<&Path>) -> Result<()> {
    let merged = load_merged(config)?;
    let document = DesiredState::from_config(&merged).to_document();
    let mut text = serde_json::to_string_pretty(&document)?;
    text.push('\n');

    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Rendered configuration to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
