//! Snapshot of what the gateway currently has registered

use crate::config::FallbackChain;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

/// A credential as listed by `GET /credentials`.
///
/// The gateway redacts secrets, so only non-secret fields are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredential {
    pub name: String,
    pub api_base: Option<String>,
    pub custom_llm_provider: Option<String>,
}

/// A deployment as listed by `GET /v2/model/info`
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteModel {
    /// Gateway-assigned deployment id
    pub id: String,
    pub model_name: String,
    pub credential_name: Option<String>,
    pub litellm_params: Map<String, Value>,
    pub model_info: Map<String, Value>,
}

/// Remote state fetched once at the start of a run and never mutated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteState {
    pub credentials: Vec<RemoteCredential>,
    pub models: Vec<RemoteModel>,
    pub aliases: IndexMap<String, String>,
    pub fallbacks: Vec<FallbackChain>,
    /// The model list could not be read; it was only wanted for validation
    pub models_unavailable: bool,
}

impl RemoteState {
    /// Names the gateway can route: model groups and aliases
    pub fn routable_names(&self) -> BTreeSet<String> {
        self.models
            .iter()
            .map(|m| m.model_name.clone())
            .chain(self.aliases.keys().cloned())
            .collect()
    }
}

/// Parse a credentials listing, which is either a bare list or wrapped in
/// `{"credentials": [...]}`.
pub fn parse_credentials(body: &Value) -> Vec<RemoteCredential> {
    let list = match body {
        Value::Object(map) => map.get("credentials").unwrap_or(body),
        other => other,
    };
    let Value::Array(entries) = list else {
        warn!("Unexpected credentials response shape");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("credential_name")?.as_str()?.to_string();
            if name.is_empty() {
                return None;
            }
            let text = |outer: &str, inner: &str| {
                entry
                    .get(outer)
                    .and_then(|o| o.get(inner))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            Some(RemoteCredential {
                api_base: text("credential_values", "api_base"),
                custom_llm_provider: text("credential_info", "custom_llm_provider"),
                name,
            })
        })
        .collect()
}

/// Parse `GET /v2/model/info`; entries without a name or id are skipped.
pub fn parse_models(body: &Value) -> Vec<RemoteModel> {
    let Some(Value::Array(entries)) = body.get("data") else {
        warn!("Unexpected model info response shape");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let model_name = entry.get("model_name")?.as_str()?.to_string();
            let model_info = object(entry.get("model_info"));
            let id = model_info.get("id")?.as_str()?.to_string();
            let litellm_params = object(entry.get("litellm_params"));
            let credential_name = litellm_params
                .get("litellm_credential_name")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(RemoteModel {
                id,
                model_name,
                credential_name,
                litellm_params,
                model_info,
            })
        })
        .collect()
}

/// Pull aliases and fallbacks out of `GET /router/settings`
pub fn parse_router_settings(body: &Value) -> (IndexMap<String, String>, Vec<FallbackChain>) {
    let current = current_router_settings(body);

    let aliases = match current.get("model_group_alias") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(name, target)| Some((name.clone(), alias_target(target)?)))
            .collect(),
        _ => IndexMap::new(),
    };

    let mut fallbacks = Vec::new();
    if let Some(Value::Array(entries)) = current.get("fallbacks") {
        for entry in entries {
            let Value::Object(map) = entry else { continue };
            for (source, targets) in map {
                let Value::Array(targets) = targets else { continue };
                let targets = targets
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                fallbacks.push(FallbackChain::new(source.clone(), targets));
            }
        }
    }

    (aliases, fallbacks)
}

/// `current_values` of a router settings response
pub(crate) fn current_router_settings(body: &Value) -> Map<String, Value> {
    object(body.get("current_values"))
}

/// The gateway accepts both `"alias": "target"` and
/// `"alias": {"model": "target", ...}`.
fn alias_target(value: &Value) -> Option<String> {
    match value {
        Value::String(target) => Some(target.clone()),
        Value::Object(map) => map.get("model").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn object(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
