//! Sync command implementation

use crate::cli::Format;
use anyhow::{bail, Result};
use litellm_sync::{load_merged, plan, Applier, Category, DesiredState, DiffOptions, HttpGateway, Settings};
use std::path::Path;

/// Options of one `sync` invocation
pub struct SyncArgs<'a> {
    pub config: &'a Path,
    pub only: Vec<Category>,
    pub force: bool,
    pub prune: bool,
    pub replace_existing: bool,
    pub format: Format,
}

/// Run the sync command
pub async fn run(settings: &Settings, args: SyncArgs<'_>) -> Result<()> {
    let mut categories = Vec::new();
    for category in args.only {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        categories = Category::ALL.to_vec();
    }

    // Configuration errors abort before any network activity
    let config = load_merged(args.config)?;
    let desired = DesiredState::from_config(&config);

    let gateway = HttpGateway::new(settings)?;
    let options = DiffOptions {
        categories,
        prune: args.prune,
        replace_existing: args.replace_existing,
    };
    let plan = plan(&gateway, &desired, &options).await?;

    match args.format {
        Format::Text => print!("{}", plan.changes),
        Format::Json => println!("{}", serde_json::to_string_pretty(&plan.changes.to_json())?),
    }

    let report = Applier::new(&gateway, settings.concurrency)
        .apply(&plan.changes, args.force)
        .await;
    eprint!("{}", report);

    if report.has_failures() {
        bail!("{} operation(s) failed", report.errors.len());
    }
    Ok(())
}
