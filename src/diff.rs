//! Desired vs. remote comparison producing a [`ChangeSet`]

use crate::config::FallbackChain;
use crate::remote::{RemoteCredential, RemoteModel, RemoteState};
use crate::state::{Credential, DesiredState, Entity, ModelDeployment};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Entity categories, in the order they are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Credentials,
    Models,
    Aliases,
    Fallbacks,
}

impl Category {
    /// All categories
    pub const ALL: [Category; 4] = [
        Category::Credentials,
        Category::Models,
        Category::Aliases,
        Category::Fallbacks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Credentials => "credentials",
            Category::Models => "models",
            Category::Aliases => "aliases",
            Category::Fallbacks => "fallbacks",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credentials" => Ok(Category::Credentials),
            "models" => Ok(Category::Models),
            "aliases" => Ok(Category::Aliases),
            "fallbacks" => Ok(Category::Fallbacks),
            _ => Err(format!(
                "Unknown category: {}. Valid: credentials, models, aliases, fallbacks",
                s
            )),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs for [`diff`]
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Categories to compare; others are left out of the change set entirely
    pub categories: Vec<Category>,
    /// Turn remote-only entities into deletes
    pub prune: bool,
    /// Update every entity present on both sides, even when it matches
    pub replace_existing: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            prune: false,
            replace_existing: false,
        }
    }
}

/// Replace an existing remote entity with the desired one
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Remote identifier of the entity being replaced, where the gateway has one
    pub remote_id: Option<String>,
    pub entity: Entity,
}

/// Remove a remote entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub category: Category,
    /// Display identity (credential name, model key, alias name, fallback source)
    pub key: String,
    pub remote_id: Option<String>,
    /// Remove only the repeated remote entries for `key`, keeping the first
    pub duplicates_only: bool,
}

impl Delete {
    /// Label shown in reports
    pub fn label(&self) -> String {
        if self.duplicates_only {
            format!("{} (duplicate entries)", self.key)
        } else {
            self.key.clone()
        }
    }
}

/// Changes for one category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryChanges {
    pub creates: Vec<Entity>,
    pub updates: Vec<Update>,
    pub deletes: Vec<Delete>,
    /// Remote-only entities left alone because prune is off
    pub retained: Vec<String>,
    /// Entities that already match
    pub unchanged: usize,
}

impl CategoryChanges {
    /// No create, update or delete
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    fn remote_only(&mut self, delete: Delete, prune: bool) {
        if prune {
            self.deletes.push(delete);
        } else {
            self.retained.push(delete.label());
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "create": self.creates.iter().map(Entity::describe).collect::<Vec<_>>(),
            "update": self.updates.iter().map(|u| json!({
                "id": u.remote_id,
                "entity": u.entity.describe(),
            })).collect::<Vec<_>>(),
            "delete": self.deletes.iter().map(|d| json!({
                "key": d.key,
                "id": d.remote_id,
                "duplicates_only": d.duplicates_only,
            })).collect::<Vec<_>>(),
            "retained": self.retained,
            "unchanged": self.unchanged,
        })
    }
}

/// Ordered set of changes per selected category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    categories: BTreeMap<Category, CategoryChanges>,
}

impl ChangeSet {
    /// Build from already-computed category changes
    pub fn from_categories(categories: impl IntoIterator<Item = (Category, CategoryChanges)>) -> Self {
        Self {
            categories: categories.into_iter().collect(),
        }
    }

    /// Set the changes for one category
    pub fn insert(&mut self, category: Category, changes: CategoryChanges) {
        self.categories.insert(category, changes);
    }

    /// Changes for a category, if it was selected
    pub fn get(&self, category: Category) -> Option<&CategoryChanges> {
        self.categories.get(&category)
    }

    /// Selected categories with their changes, in report order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryChanges)> {
        self.categories.iter().map(|(c, changes)| (*c, changes))
    }

    /// True when no selected category has anything to do
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(CategoryChanges::is_empty)
    }

    /// Machine-readable report
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .categories
            .iter()
            .map(|(c, changes)| (c.as_str().to_string(), changes.to_json()))
            .collect();
        Value::Object(map)
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, changes) in &self.categories {
            writeln!(
                f,
                "{}: {} to create, {} to update, {} to delete, {} unchanged",
                category,
                changes.creates.len(),
                changes.updates.len(),
                changes.deletes.len(),
                changes.unchanged
            )?;
            for entity in &changes.creates {
                writeln!(f, "  + {}", entity.key())?;
            }
            for update in &changes.updates {
                writeln!(f, "  ~ {}", update.entity.key())?;
            }
            for delete in &changes.deletes {
                writeln!(f, "  - {}", delete.label())?;
            }
            for key in &changes.retained {
                writeln!(f, "  ? {} (remote only, kept without --prune)", key)?;
            }
        }
        Ok(())
    }
}

/// Compute the changes that bring `remote` in line with `desired`
pub fn diff(desired: &DesiredState, remote: &RemoteState, options: &DiffOptions) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for category in &options.categories {
        let category_changes = match category {
            Category::Credentials => diff_credentials(&desired.credentials, &remote.credentials, options),
            Category::Models => diff_models(&desired.models, &remote.models, options),
            Category::Aliases => diff_aliases(desired, &remote.aliases, options),
            Category::Fallbacks => diff_fallbacks(&desired.fallbacks, &remote.fallbacks, options),
        };
        changes.insert(*category, category_changes);
    }
    changes
}

fn diff_credentials(
    desired: &[Credential],
    remote: &[RemoteCredential],
    options: &DiffOptions,
) -> CategoryChanges {
    let mut changes = CategoryChanges::default();
    let mut by_name: IndexMap<&str, &RemoteCredential> = IndexMap::new();
    for credential in remote {
        by_name.entry(credential.name.as_str()).or_insert(credential);
    }

    for credential in desired {
        match by_name.shift_remove(credential.name.as_str()) {
            Some(existing) => {
                if options.replace_existing || !credential_matches(credential, existing) {
                    changes.updates.push(Update {
                        remote_id: Some(existing.name.clone()),
                        entity: Entity::Credential(credential.clone()),
                    });
                } else {
                    changes.unchanged += 1;
                }
            }
            None => changes.creates.push(Entity::Credential(credential.clone())),
        }
    }

    for name in by_name.keys() {
        let delete = Delete {
            category: Category::Credentials,
            key: name.to_string(),
            remote_id: Some(name.to_string()),
            duplicates_only: false,
        };
        changes.remote_only(delete, options.prune);
    }
    changes
}

/// Secrets are redacted remotely, so only fields the gateway reports are
/// compared.
fn credential_matches(desired: &Credential, remote: &RemoteCredential) -> bool {
    let provider_matches = remote
        .custom_llm_provider
        .as_deref()
        .map_or(true, |p| p == desired.custom_llm_provider);
    let base_matches = remote
        .api_base
        .as_deref()
        .map_or(true, |b| b == desired.api_base);
    provider_matches && base_matches
}

type ModelKey<'a> = (&'a str, &'a str, &'a str);

fn remote_model_key(model: &RemoteModel) -> ModelKey<'_> {
    (
        &model.model_name,
        model.credential_name.as_deref().unwrap_or_default(),
        model
            .litellm_params
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    )
}

fn remote_model_delete(model: &RemoteModel) -> Delete {
    let (name, credential, upstream) = remote_model_key(model);
    Delete {
        category: Category::Models,
        key: format!("{} ({}, {})", name, credential, upstream),
        remote_id: Some(model.id.clone()),
        duplicates_only: false,
    }
}

fn diff_models(
    desired: &[ModelDeployment],
    remote: &[RemoteModel],
    options: &DiffOptions,
) -> CategoryChanges {
    let mut changes = CategoryChanges::default();
    let mut groups: IndexMap<ModelKey<'_>, Vec<&RemoteModel>> = IndexMap::new();
    for model in remote {
        groups.entry(remote_model_key(model)).or_default().push(model);
    }

    for model in desired {
        match groups.shift_remove(&model.identity()) {
            Some(existing) => {
                let Some((first, duplicates)) = existing.split_first() else {
                    continue;
                };
                if options.replace_existing || !model_matches(model, first) {
                    changes.updates.push(Update {
                        remote_id: Some(first.id.clone()),
                        entity: Entity::Model(model.clone()),
                    });
                } else {
                    changes.unchanged += 1;
                }
                for duplicate in duplicates {
                    changes.remote_only(remote_model_delete(duplicate), options.prune);
                }
            }
            None => changes.creates.push(Entity::Model(model.clone())),
        }
    }

    for model in groups.values().flatten() {
        changes.remote_only(remote_model_delete(model), options.prune);
    }
    changes
}

/// Fields the gateway adds to every deployment on its own
const GATEWAY_MODEL_INFO_KEYS: &[&str] = &[
    "id",
    "db_model",
    "created_at",
    "created_by",
    "updated_at",
    "updated_by",
    "team_id",
    "team_public_model_name",
    "direct_access",
    "access_via_team_ids",
    "key",
];

const GATEWAY_LITELLM_PARAMS_KEYS: &[&str] = &[
    "use_in_pass_through",
    "use_litellm_proxy",
    "merge_reasoning_content_in_choices",
];

fn model_matches(desired: &ModelDeployment, remote: &RemoteModel) -> bool {
    let mut litellm_params = remote.litellm_params.clone();
    let mut model_info = remote.model_info.clone();
    litellm_params.retain(|key, _| !GATEWAY_LITELLM_PARAMS_KEYS.contains(&key.as_str()));
    model_info.retain(|key, _| !GATEWAY_MODEL_INFO_KEYS.contains(&key.as_str()));

    let desired_value = normalize_model(desired.to_value());
    let remote_value = normalize_model(json!({
        "model_name": remote.model_name,
        "litellm_params": litellm_params,
        "model_info": model_info,
    }));
    content_matches(&desired_value, Some(&remote_value))
}

/// Access groups are a set; order carries no meaning.
fn normalize_model(mut value: Value) -> Value {
    if let Some(Value::Array(groups)) = value
        .get_mut("model_info")
        .and_then(|info| info.get_mut("access_groups"))
    {
        groups.sort_by_key(|g| g.to_string());
    }
    value
}

/// Field-order-independent comparison of desired content against remote
/// content.
///
/// A field missing on one side matches only a default value (`null`,
/// `false`, `""`, empty list or mapping) on the other, so fields removed
/// locally still count as a difference.
pub(crate) fn content_matches(desired: &Value, remote: Option<&Value>) -> bool {
    match (desired, remote) {
        (desired, None) | (desired, Some(Value::Null)) => is_default(desired),
        (Value::Null, Some(remote)) => is_default(remote),
        (Value::Object(d), Some(Value::Object(r))) => {
            d.iter().all(|(key, value)| content_matches(value, r.get(key)))
                && r
                    .iter()
                    .filter(|(key, _)| !d.contains_key(*key))
                    .all(|(_, value)| is_default(value))
        }
        (Value::Array(d), Some(Value::Array(r))) => {
            d.len() == r.len() && d.iter().zip(r).all(|(a, b)| content_matches(a, Some(b)))
        }
        (Value::Number(a), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (desired, Some(remote)) => desired == remote,
    }
}

fn is_default(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_default),
        Value::Number(_) => false,
    }
}

fn diff_aliases(
    desired: &DesiredState,
    remote: &IndexMap<String, String>,
    options: &DiffOptions,
) -> CategoryChanges {
    let mut changes = CategoryChanges::default();
    let mut remaining = remote.clone();

    for alias in &desired.aliases {
        match remaining.shift_remove(&alias.name) {
            Some(target) if target == alias.target && !options.replace_existing => {
                changes.unchanged += 1;
            }
            Some(_) => changes.updates.push(Update {
                remote_id: None,
                entity: Entity::Alias(alias.clone()),
            }),
            None => changes.creates.push(Entity::Alias(alias.clone())),
        }
    }

    for name in remaining.keys() {
        let delete = Delete {
            category: Category::Aliases,
            key: name.clone(),
            remote_id: None,
            duplicates_only: false,
        };
        changes.remote_only(delete, options.prune);
    }
    changes
}

fn diff_fallbacks(
    desired: &[FallbackChain],
    remote: &[FallbackChain],
    options: &DiffOptions,
) -> CategoryChanges {
    let mut changes = CategoryChanges::default();
    let mut remaining: IndexMap<&str, Vec<&FallbackChain>> = IndexMap::new();
    for chain in remote {
        remaining.entry(chain.source.as_str()).or_default().push(chain);
    }

    for chain in desired {
        let Some(existing) = remaining.shift_remove(chain.source.as_str()) else {
            changes.creates.push(Entity::Fallback(chain.clone()));
            continue;
        };
        let Some((first, duplicates)) = existing.split_first() else {
            continue;
        };
        if first.targets == chain.targets && !options.replace_existing {
            changes.unchanged += 1;
        } else {
            changes.updates.push(Update {
                remote_id: None,
                entity: Entity::Fallback(chain.clone()),
            });
        }
        if !duplicates.is_empty() {
            let delete = Delete {
                category: Category::Fallbacks,
                key: chain.source.clone(),
                remote_id: None,
                duplicates_only: true,
            };
            changes.remote_only(delete, options.prune);
        }
    }

    // Deleting a source removes every entry for it, duplicates included
    for source in remaining.keys() {
        let delete = Delete {
            category: Category::Fallbacks,
            key: source.to_string(),
            remote_id: None,
            duplicates_only: false,
        };
        changes.remote_only(delete, options.prune);
    }
    changes
}

/// Alias targets and fallback members that resolve to nothing routable,
/// as human-readable warnings.
///
/// Returns nothing when the remote model list is unavailable.
pub fn dangling_references(desired: &DesiredState, remote: &RemoteState) -> Vec<String> {
    if remote.models_unavailable {
        return Vec::new();
    }
    let mut known: BTreeSet<String> = remote.routable_names();
    for model in &remote.models {
        if let Some(upstream) = model.litellm_params.get("model").and_then(Value::as_str) {
            known.insert(upstream.to_string());
        }
    }
    for model in &desired.models {
        known.insert(model.model_name.clone());
        known.insert(model.upstream().to_string());
    }
    known.extend(desired.aliases.iter().map(|a| a.name.clone()));

    let mut warnings = Vec::new();
    for alias in &desired.aliases {
        if !known.contains(&alias.target) {
            warnings.push(format!(
                "Alias '{}' points to non-existent model: {}",
                alias.name, alias.target
            ));
        }
    }
    for chain in &desired.fallbacks {
        if !known.contains(&chain.source) {
            warnings.push(format!(
                "Fallback source '{}' is a non-existent model or alias",
                chain.source
            ));
        }
        for target in &chain.targets {
            if !known.contains(target) {
                warnings.push(format!(
                    "Fallback target '{}' for '{}' is a non-existent model or alias",
                    target, chain.source
                ));
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergedConfig;
    use crate::state::Alias;

    fn desired() -> DesiredState {
        let config = MergedConfig::from_layers(
            &json!({
                "providers": {"ag": {
                    "api_base": "http://ag:8045",
                    "api_key": "sk-ag",
                    "access_groups": ["General", "Beta"],
                    "interfaces": {"anthropic": {"models": {"claude-opus": null}}}
                }},
                "aliases": {"claude-opus-4-5": "anthropic/claude-opus"},
                "fallbacks": [{"claude-opus": ["gemini-pro", "glm-4.7"]}]
            }),
            None,
        )
        .unwrap();
        DesiredState::from_config(&config)
    }

    /// Remote state as the gateway would report `desired()` after a sync
    fn synced_remote() -> RemoteState {
        RemoteState {
            credentials: vec![RemoteCredential {
                name: "ag-anthropic".to_string(),
                api_base: None,
                custom_llm_provider: Some("Anthropic".to_string()),
            }],
            models: vec![RemoteModel {
                id: "m-1".to_string(),
                model_name: "claude-opus".to_string(),
                credential_name: Some("ag-anthropic".to_string()),
                litellm_params: json!({
                    "litellm_credential_name": "ag-anthropic",
                    "model": "anthropic/claude-opus",
                    "use_in_pass_through": false
                })
                .as_object()
                .cloned()
                .unwrap(),
                model_info: json!({
                    "id": "m-1",
                    "db_model": true,
                    "access_groups": ["Beta", "General"],
                    "base_model": "claude-opus",
                    "created_by": "admin"
                })
                .as_object()
                .cloned()
                .unwrap(),
            }],
            aliases: IndexMap::from([(
                "claude-opus-4-5".to_string(),
                "anthropic/claude-opus".to_string(),
            )]),
            fallbacks: vec![FallbackChain::new(
                "claude-opus",
                vec!["gemini-pro".into(), "glm-4.7".into()],
            )],
            models_unavailable: false,
        }
    }

    #[test]
    fn test_identical_state_yields_empty_changeset() {
        let changes = diff(&desired(), &synced_remote(), &DiffOptions::default());
        assert!(changes.is_empty());
        for (_, category) in changes.iter() {
            assert_eq!(category.unchanged, 1);
            assert!(category.retained.is_empty());
        }
    }

    #[test]
    fn test_everything_missing_remotely_is_created() {
        let changes = diff(&desired(), &RemoteState::default(), &DiffOptions::default());
        for category in Category::ALL {
            let c = changes.get(category).unwrap();
            assert_eq!(c.creates.len(), 1, "{category}");
            assert!(c.updates.is_empty() && c.deletes.is_empty());
        }
    }

    #[test]
    fn test_remote_only_alias_needs_prune() {
        let mut remote = synced_remote();
        remote.aliases.insert("old".to_string(), "anthropic/old".to_string());

        let options = DiffOptions::default();
        let kept = diff(&desired(), &remote, &options);
        let aliases = kept.get(Category::Aliases).unwrap();
        assert!(aliases.deletes.is_empty());
        assert_eq!(aliases.retained, vec!["old".to_string()]);

        let options = DiffOptions {
            prune: true,
            ..DiffOptions::default()
        };
        let pruned = diff(&desired(), &remote, &options);
        let aliases = pruned.get(Category::Aliases).unwrap();
        assert_eq!(aliases.deletes.len(), 1);
        assert_eq!(aliases.deletes[0].key, "old");
    }

    #[test]
    fn test_changed_content_is_full_update() {
        let mut remote = synced_remote();
        remote.models[0]
            .model_info
            .insert("access_groups".to_string(), json!(["General"]));
        remote.fallbacks[0].targets.reverse();
        remote.aliases["claude-opus-4-5"] = "anthropic/other".to_string();

        let changes = diff(&desired(), &remote, &DiffOptions::default());
        let models = changes.get(Category::Models).unwrap();
        assert_eq!(models.updates.len(), 1);
        assert_eq!(models.updates[0].remote_id.as_deref(), Some("m-1"));
        assert_eq!(changes.get(Category::Fallbacks).unwrap().updates.len(), 1);
        assert_eq!(changes.get(Category::Aliases).unwrap().updates.len(), 1);
    }

    #[test]
    fn test_replace_existing_updates_matching_entities() {
        let options = DiffOptions {
            replace_existing: true,
            ..DiffOptions::default()
        };
        let changes = diff(&desired(), &synced_remote(), &options);
        for (_, category) in changes.iter() {
            assert_eq!(category.updates.len(), 1);
            assert_eq!(category.unchanged, 0);
        }
    }

    #[test]
    fn test_access_groups_removed_locally_is_update() {
        let mut state = desired();
        state.models[0].model_info.shift_remove("access_groups");

        let changes = diff(&state, &synced_remote(), &DiffOptions::default());
        let models = changes.get(Category::Models).unwrap();
        assert_eq!(models.updates.len(), 1);
        assert_eq!(models.unchanged, 0);
    }

    #[test]
    fn test_litellm_param_removed_locally_is_update() {
        let mut remote = synced_remote();
        remote.models[0]
            .litellm_params
            .insert("max_tokens".to_string(), json!(64000));

        let changes = diff(&desired(), &remote, &DiffOptions::default());
        assert_eq!(changes.get(Category::Models).unwrap().updates.len(), 1);
    }

    #[test]
    fn test_gateway_bookkeeping_fields_are_ignored() {
        let mut remote = synced_remote();
        let info = &mut remote.models[0].model_info;
        info.insert("updated_at".to_string(), json!("2026-01-01T00:00:00.000Z"));
        info.insert("team_id".to_string(), json!("ops"));
        info.insert("input_cost_per_token".to_string(), json!(null));

        let changes = diff(&desired(), &remote, &DiffOptions::default());
        assert_eq!(changes.get(Category::Models).unwrap().unchanged, 1);
    }

    #[test]
    fn test_duplicate_remote_fallbacks_are_prune_candidates() {
        let mut remote = synced_remote();
        remote
            .fallbacks
            .push(FallbackChain::new("claude-opus", vec!["stale".into()]));

        let kept = diff(&desired(), &remote, &DiffOptions::default());
        let fallbacks = kept.get(Category::Fallbacks).unwrap();
        assert_eq!(fallbacks.unchanged, 1);
        assert_eq!(fallbacks.retained, vec!["claude-opus (duplicate entries)".to_string()]);

        let options = DiffOptions {
            prune: true,
            ..DiffOptions::default()
        };
        let pruned = diff(&desired(), &remote, &options);
        let deletes = &pruned.get(Category::Fallbacks).unwrap().deletes;
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].key, "claude-opus");
        assert!(deletes[0].duplicates_only);
    }

    #[test]
    fn test_credential_provider_mismatch_is_update() {
        let mut remote = synced_remote();
        remote.credentials[0].custom_llm_provider = Some("OpenAI_Compatible".to_string());
        let changes = diff(&desired(), &remote, &DiffOptions::default());
        assert_eq!(changes.get(Category::Credentials).unwrap().updates.len(), 1);
    }

    #[test]
    fn test_duplicate_remote_models_are_prune_candidates() {
        let mut remote = synced_remote();
        let mut duplicate = remote.models[0].clone();
        duplicate.id = "m-2".to_string();
        remote.models.push(duplicate);

        let changes = diff(&desired(), &remote, &DiffOptions { prune: true, ..DiffOptions::default() });
        let models = changes.get(Category::Models).unwrap();
        assert_eq!(models.unchanged, 1);
        assert_eq!(models.deletes.len(), 1);
        assert_eq!(models.deletes[0].remote_id.as_deref(), Some("m-2"));
    }

    #[test]
    fn test_unselected_categories_are_excluded() {
        let mut remote = synced_remote();
        remote.credentials.push(RemoteCredential {
            name: "stale-openai".to_string(),
            api_base: None,
            custom_llm_provider: None,
        });
        let options = DiffOptions {
            categories: vec![Category::Aliases],
            prune: true,
            replace_existing: false,
        };
        let changes = diff(&desired(), &remote, &options);
        assert!(changes.get(Category::Credentials).is_none());
        assert_eq!(changes.iter().count(), 1);
    }

    #[test]
    fn test_content_matches_defaults() {
        assert!(content_matches(&json!({"a": null, "b": false, "c": []}), Some(&json!({}))));
        assert!(content_matches(&json!({"n": 1}), Some(&json!({"n": 1.0, "extra": null}))));
        assert!(!content_matches(&json!({"n": 1}), Some(&json!({"n": 1, "extra": 2}))));
        assert!(!content_matches(&json!({"n": 1}), Some(&json!({}))));
        assert!(content_matches(&json!({}), Some(&json!({"groups": []}))));
        assert!(!content_matches(&json!(["a", "b"]), Some(&json!(["b", "a"]))));
    }

    #[test]
    fn test_parse_category() {
        assert_eq!("Models".parse::<Category>(), Ok(Category::Models));
        assert!("routes".parse::<Category>().is_err());
    }

    #[test]
    fn test_dangling_references() {
        let mut state = desired();
        state.aliases.push(Alias {
            name: "ghost".to_string(),
            target: "anthropic/ghost".to_string(),
        });
        state.fallbacks.push(FallbackChain::new("ghost", vec!["claude-opus".into()]));
        let warnings = dangling_references(&state, &RemoteState::default());
        assert!(warnings.iter().any(|w| w.contains("anthropic/ghost")));
        assert!(warnings.iter().any(|w| w.contains("'gemini-pro'")));
        assert!(!warnings.iter().any(|w| w.contains("Fallback source 'ghost'")));

        let unavailable = RemoteState {
            models_unavailable: true,
            ..RemoteState::default()
        };
        assert!(dangling_references(&state, &unavailable).is_empty());
    }

    #[test]
    fn test_display_lists_changes() {
        let changes = diff(&desired(), &RemoteState::default(), &DiffOptions::default());
        let text = changes.to_string();
        assert!(text.contains("aliases: 1 to create, 0 to update, 0 to delete, 0 unchanged"));
        assert!(text.contains("  + claude-opus-4-5"));
        assert_eq!(changes.to_json()["models"]["create"][0]["model_name"], "claude-opus");
    }
}
