//! Layered sync configuration
//!
//! Configuration is read from two documents in priority order:
//! 1. Local override (`config.local.json`, optional, not checked in)
//! 2. Base document (`config.json`)
//!
//! The override is deep-merged onto the base, then provider `$extend`
//! directives, model `access_groups` inheritance and fallback `$base`
//! references are resolved. The result is rebuilt on every run.

use crate::merge::{deep_merge, expand_base_refs, inherit_access_groups, resolve_extends};
use crate::provider::InterfaceKind;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An upstream LLM backend registered with the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// Endpoint without the interface path suffix
    #[serde(default)]
    pub api_base: String,

    /// API key; providers without one are declared but not synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default access groups for this provider's models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_groups: Option<Vec<String>>,

    /// Exposed interfaces, each with its own model list
    #[serde(default)]
    pub interfaces: IndexMap<InterfaceKind, InterfaceDefinition>,
}

impl ProviderDefinition {
    /// A provider is synced only when it carries an API key
    pub fn is_active(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Models served through one interface of a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    /// Upstream model id -> per-model overrides
    #[serde(default)]
    pub models: IndexMap<String, ModelOverride>,
}

/// Optional per-model settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOverride {
    /// Public model group name (defaults to the upstream id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    /// Access groups; inherited from the provider when not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_groups: Option<Vec<String>>,

    /// Extra `model_info` fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub model_info: Map<String, Value>,

    /// Extra `litellm_params` fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub litellm_params: Map<String, Value>,
}

/// Ordered retry sequence for a model or alias (first = preferred)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    /// Model or alias the chain applies to
    pub source: String,

    /// Targets in retry order
    pub targets: Vec<String>,
}

impl FallbackChain {
    /// Create a fallback chain
    pub fn new(source: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            source: source.into(),
            targets,
        }
    }

    /// Gateway representation: a single-key mapping `{source: [targets]}`
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.source.clone(), Value::from(self.targets.clone()));
        Value::Object(map)
    }
}

/// Base and override documents after merging and inheritance resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig {
    /// Providers with `$extend` resolved and model access groups filled in
    pub providers: IndexMap<String, ProviderDefinition>,

    /// Alias name -> `<provider>/<upstream-model-id>`
    pub aliases: IndexMap<String, String>,

    /// Fallback chains with `$base` references expanded
    pub fallbacks: Vec<FallbackChain>,
}

impl MergedConfig {
    /// Build from an already-parsed base document and optional override
    pub fn from_layers(base: &Value, local: Option<&Value>) -> Result<Self> {
        if !base.is_object() {
            return Err(Error::InvalidConfig {
                key_path: "$".to_string(),
                message: "document must be a mapping".to_string(),
            });
        }
        let merged = match local {
            Some(local) => deep_merge(base, local),
            None => base.clone(),
        };
        Self::resolve(&merged, base)
    }

    fn resolve(merged: &Value, base: &Value) -> Result<Self> {
        let providers = match merged.get("providers") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(Error::InvalidConfig {
                    key_path: "providers".to_string(),
                    message: "expected a mapping".to_string(),
                })
            }
        };
        let mut providers = resolve_extends(&providers)?;
        inherit_access_groups(&mut providers);

        let mut typed = IndexMap::new();
        for (name, definition) in providers {
            let key_path = format!("providers.{}", name);
            let provider: ProviderDefinition = parse_at(&key_path, definition)?;
            typed.insert(name, provider);
        }

        let aliases: IndexMap<String, String> = match merged.get("aliases") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(value) => parse_at("aliases", value.clone())?,
        };

        let fallbacks = match merged.get("fallbacks") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => {
                let base_fallbacks = base.get("fallbacks").cloned().unwrap_or(Value::Null);
                let expanded = expand_base_refs(value, &base_fallbacks);
                let entries: Vec<IndexMap<String, Vec<String>>> = parse_at("fallbacks", expanded)?;
                let mut chains: IndexMap<String, Vec<String>> = IndexMap::new();
                for entry in entries {
                    chains.extend(entry);
                }
                chains
                    .into_iter()
                    .map(|(source, targets)| FallbackChain::new(source, targets))
                    .collect()
            }
        };

        Ok(MergedConfig {
            providers: typed,
            aliases,
            fallbacks,
        })
    }
}

fn parse_at<T: DeserializeOwned>(key_path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::InvalidConfig {
        key_path: key_path.to_string(),
        message: e.to_string(),
    })
}

/// Path of the local override for a base document:
/// `config.json` -> `config.local.json` in the same directory.
pub fn local_override_path(base_path: &Path) -> PathBuf {
    let stem = base_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match base_path.extension() {
        Some(ext) => format!("{}.local.{}", stem, ext.to_string_lossy()),
        None => format!("{}.local", stem),
    };
    base_path.with_file_name(name)
}

/// Load the base document and its local override (if present) and resolve
/// them into a [`MergedConfig`].
pub fn load_merged(base_path: &Path) -> Result<MergedConfig> {
    let local_path = local_override_path(base_path);
    load_layers(base_path, Some(&local_path))
}

/// Load an explicit base/override pair. A missing override file is not an
/// error; the result then equals the base document.
pub fn load_layers(base_path: &Path, local_path: Option<&Path>) -> Result<MergedConfig> {
    let base = load_document(base_path)?;

    let local = match local_path {
        Some(local_path) if local_path.exists() => {
            info!("Found local config: {}", local_path.display());
            Some(load_document(local_path)?)
        }
        Some(local_path) => {
            debug!("No local config at {}", local_path.display());
            None
        }
        None => None,
    };

    MergedConfig::from_layers(&base, local.as_ref())
}

/// Read one document as a JSON tree; YAML and TOML are chosen by extension.
pub(crate) fn load_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    debug!("Loading configuration from {} (format: {})", path.display(), extension);

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            location: e
                .location()
                .map(|l| format!("line {} column {}", l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string()),
            message: e.to_string(),
        }),
        "toml" => toml::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            location: e
                .span()
                .map(|span| line_column(&content, span.start))
                .unwrap_or_else(|| "unknown location".to_string()),
            message: e.message().to_string(),
        }),
        _ => serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            location: format!("line {} column {}", e.line(), e.column()),
            message: e.to_string(),
        }),
    }
}

fn line_column(content: &str, offset: usize) -> String {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    format!("line {} column {}", line, column)
}
