//! Best-effort application of a [`ChangeSet`] through a [`Gateway`]

use crate::client::Gateway;
use crate::diff::{Category, CategoryChanges, ChangeSet, Update};
use crate::state::Entity;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info};

/// Kind of remote mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyAction::Create => "create",
            ApplyAction::Update => "update",
            ApplyAction::Delete => "delete",
        })
    }
}

/// One failed remote call; collected, never propagated
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to {action} {category} '{entity}': {cause}")]
pub struct ApplyError {
    pub category: Category,
    pub entity: String,
    pub action: ApplyAction,
    pub cause: String,
}

/// Outcome counts for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorySummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Result of applying a change set
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Nothing was sent to the gateway
    pub dry_run: bool,
    pub summaries: BTreeMap<Category, CategorySummary>,
    pub errors: Vec<ApplyError>,
}

impl ApplyReport {
    /// True if any remote call failed
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn summary(&self, category: Category) -> CategorySummary {
        self.summaries.get(&category).copied().unwrap_or_default()
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            return writeln!(f, "Dry run: nothing applied (use --force to apply)");
        }
        for (category, s) in &self.summaries {
            writeln!(
                f,
                "{}: {} created, {} updated, {} deleted, {} failed",
                category, s.created, s.updated, s.deleted, s.failed
            )?;
        }
        for err in &self.errors {
            writeln!(f, "  ! {}", err)?;
        }
        Ok(())
    }
}

enum Upsert<'c> {
    Create(&'c Entity),
    Update(&'c Update),
}

type Outcome = (ApplyAction, String, crate::Result<()>);

/// Applies creates, then updates, then deletes.
///
/// Categories run concurrently. Within a category, creates and updates share
/// a bounded pool and deletes start only once all of them have finished.
pub struct Applier<'g, G: Gateway + ?Sized> {
    gateway: &'g G,
    concurrency: usize,
}

impl<'g, G: Gateway + ?Sized> Applier<'g, G> {
    pub fn new(gateway: &'g G, concurrency: usize) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Apply `changes`; without `force` nothing is sent.
    pub async fn apply(&self, changes: &ChangeSet, force: bool) -> ApplyReport {
        let mut report = ApplyReport {
            dry_run: !force,
            ..ApplyReport::default()
        };
        if !force {
            return report;
        }

        let results = join_all(
            changes
                .iter()
                .map(|(category, category_changes)| self.apply_category(category, category_changes)),
        )
        .await;

        for (category, summary, errors) in results {
            info!(
                "{}: {} created, {} updated, {} deleted, {} failed",
                category, summary.created, summary.updated, summary.deleted, summary.failed
            );
            report.summaries.insert(category, summary);
            report.errors.extend(errors);
        }
        report
    }

    async fn apply_category(
        &self,
        category: Category,
        changes: &CategoryChanges,
    ) -> (Category, CategorySummary, Vec<ApplyError>) {
        let gateway = self.gateway;

        let upserts = changes
            .creates
            .iter()
            .map(Upsert::Create)
            .chain(changes.updates.iter().map(Upsert::Update));
        let mut outcomes: Vec<Outcome> = stream::iter(upserts)
            .map(|op| async move {
                match op {
                    Upsert::Create(entity) => {
                        (ApplyAction::Create, entity.key(), gateway.create(entity).await)
                    }
                    Upsert::Update(update) => (
                        ApplyAction::Update,
                        update.entity.key(),
                        gateway.update(update).await,
                    ),
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let deletes: Vec<Outcome> = stream::iter(&changes.deletes)
            .map(|delete| async move {
                (ApplyAction::Delete, delete.key.clone(), gateway.delete(delete).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.extend(deletes);

        let mut summary = CategorySummary::default();
        let mut errors = Vec::new();
        for (action, entity, result) in outcomes {
            match result {
                Ok(()) => {
                    info!("{}d {} '{}'", action, category, entity);
                    match action {
                        ApplyAction::Create => summary.created += 1,
                        ApplyAction::Update => summary.updated += 1,
                        ApplyAction::Delete => summary.deleted += 1,
                    }
                }
                Err(e) => {
                    let err = ApplyError {
                        category,
                        entity,
                        action,
                        cause: e.to_string(),
                    };
                    error!("{}", err);
                    summary.failed += 1;
                    errors.push(err);
                }
            }
        }
        (category, summary, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackChain;
    use crate::diff::Delete;
    use crate::remote::RemoteState;
    use crate::state::Alias;
    use crate::{Error, Result};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory gateway recording every mutation in call order
    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    impl RecordingGateway {
        fn failing(keys: &[&str]) -> Self {
            Self {
                failing: keys.iter().map(|k| k.to_string()).collect(),
                ..Self::default()
            }
        }

        fn record(&self, call: String, key: &str) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.failing.contains(key) {
                return Err(Error::Api(format!("mock failure for {}", key)));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Gateway for RecordingGateway {
        async fn fetch_state(&self, _categories: &[Category]) -> Result<RemoteState> {
            Ok(RemoteState::default())
        }

        async fn create(&self, entity: &Entity) -> Result<()> {
            // Slow creates must still finish before any delete starts
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.record(format!("create {}", entity.key()), &entity.key())
        }

        async fn update(&self, update: &Update) -> Result<()> {
            let key = update.entity.key();
            self.record(format!("update {}", key), &key)
        }

        async fn delete(&self, delete: &Delete) -> Result<()> {
            self.record(format!("delete {}", delete.key), &delete.key)
        }
    }

    fn alias(name: &str) -> Entity {
        Entity::Alias(Alias {
            name: name.to_string(),
            target: format!("anthropic/{}", name),
        })
    }

    fn alias_delete(name: &str) -> Delete {
        Delete {
            category: Category::Aliases,
            key: name.to_string(),
            remote_id: None,
            duplicates_only: false,
        }
    }

    fn alias_changes() -> ChangeSet {
        let changes = CategoryChanges {
            creates: vec![alias("new-a"), alias("new-b")],
            updates: vec![Update {
                remote_id: None,
                entity: alias("changed"),
            }],
            deletes: vec![alias_delete("old")],
            ..CategoryChanges::default()
        };
        ChangeSet::from_categories([(Category::Aliases, changes)])
    }

    #[tokio::test]
    async fn test_dry_run_calls_nothing() {
        let gateway = RecordingGateway::default();
        let report = Applier::new(&gateway, 4).apply(&alias_changes(), false).await;
        assert!(report.dry_run);
        assert!(gateway.calls().is_empty());
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_deletes_run_after_creates_and_updates() {
        let gateway = RecordingGateway::default();
        let report = Applier::new(&gateway, 4).apply(&alias_changes(), true).await;

        let calls = gateway.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls.last().unwrap(), "delete old");
        assert_eq!(
            report.summary(Category::Aliases),
            CategorySummary {
                created: 2,
                updated: 1,
                deleted: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_siblings() {
        let gateway = RecordingGateway::failing(&["new-a"]);
        let fallbacks = CategoryChanges {
            creates: vec![Entity::Fallback(FallbackChain::new("m", vec!["n".into()]))],
            ..CategoryChanges::default()
        };
        let mut changes = alias_changes();
        changes.insert(Category::Fallbacks, fallbacks);

        let report = Applier::new(&gateway, 1).apply(&changes, true).await;

        assert_eq!(gateway.calls().len(), 5);
        assert!(report.has_failures());
        assert_eq!(report.errors.len(), 1);
        let err = &report.errors[0];
        assert_eq!(err.entity, "new-a");
        assert_eq!(err.action, ApplyAction::Create);
        assert_eq!(err.category, Category::Aliases);
        assert_eq!(report.summary(Category::Aliases).failed, 1);
        assert_eq!(report.summary(Category::Aliases).deleted, 1);
        assert_eq!(report.summary(Category::Fallbacks).created, 1);
        assert!(report.to_string().contains("aliases: 1 created, 1 updated, 1 deleted, 1 failed"));
    }

    #[tokio::test]
    async fn test_timed_out_call_is_entity_error() {
        use crate::client::HttpGateway;
        use crate::mock_server::GatewayMockServer;
        use crate::state::Credential;
        use serde_json::json;

        let mock = GatewayMockServer::start().await;
        mock.mock_router_settings(json!({"current_values": {}})).await;
        mock.mock_slow("POST", "/config/update", Duration::from_secs(2)).await;
        mock.accept_writes().await;

        let mut settings = mock.settings();
        settings.timeout = Duration::from_millis(200);
        let gateway = HttpGateway::new(&settings).unwrap();

        let credentials = CategoryChanges {
            creates: vec![Entity::Credential(Credential {
                name: "ag-openai".to_string(),
                api_key: "sk-ag".to_string(),
                api_base: "http://ag/v1".to_string(),
                custom_llm_provider: "OpenAI_Compatible".to_string(),
            })],
            ..CategoryChanges::default()
        };
        let mut changes = alias_changes();
        changes.insert(Category::Credentials, credentials);

        let report = Applier::new(&gateway, 4).apply(&changes, true).await;

        // Every alias write times out; the credential still goes through
        let aliases = report.summary(Category::Aliases);
        assert_eq!(aliases.failed, 4);
        assert_eq!(report.summary(Category::Credentials).created, 1);
        assert!(report
            .errors
            .iter()
            .all(|e| e.category == Category::Aliases));
        assert!(report
            .errors
            .iter()
            .any(|e| e.entity == "new-a" && e.action == ApplyAction::Create));
        assert_eq!(mock.requests("POST", "/credentials").await.len(), 1);
    }
}
