//! One reconciliation pass: fetch remote state and compute the change set

use crate::client::Gateway;
use crate::diff::{dangling_references, diff, ChangeSet, DiffOptions};
use crate::state::DesiredState;
use crate::Result;
use tracing::{info, warn};

/// What a pass would do, computed before anything is applied
#[derive(Debug, Clone)]
pub struct Plan {
    pub changes: ChangeSet,
    /// Alias and fallback references that resolve to nothing
    pub warnings: Vec<String>,
}

/// Fetch the selected categories and diff them against `desired`.
///
/// A failed fetch aborts the pass before any change is computed.
pub async fn plan<G: Gateway + ?Sized>(
    gateway: &G,
    desired: &DesiredState,
    options: &DiffOptions,
) -> Result<Plan> {
    let remote = gateway.fetch_state(&options.categories).await?;
    let changes = diff(desired, &remote, options);

    let warnings = dangling_references(desired, &remote);
    for warning in &warnings {
        warn!("{}", warning);
    }
    for (category, category_changes) in changes.iter() {
        for key in &category_changes.retained {
            warn!("Remote-only {} '{}' kept (use --prune to delete)", category, key);
        }
    }
    if changes.is_empty() {
        info!("Gateway already matches the configuration");
    }

    Ok(Plan { changes, warnings })
}
