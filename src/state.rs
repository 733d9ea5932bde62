//! Desired gateway entities derived from a [`MergedConfig`]

use crate::config::{FallbackChain, MergedConfig};
use crate::diff::Category;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

/// A gateway credential: one per (provider, interface kind)
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    /// `<service>-<kind>`
    pub name: String,
    pub api_key: String,
    /// Provider `api_base` with the interface path suffix applied
    pub api_base: String,
    pub custom_llm_provider: String,
}

impl Credential {
    /// Body for `POST /credentials`
    pub fn payload(&self) -> Value {
        json!({
            "credential_name": self.name,
            "credential_values": {
                "api_key": self.api_key,
                "api_base": self.api_base,
            },
            "credential_info": {
                "custom_llm_provider": self.custom_llm_provider,
            },
        })
    }
}

/// A model deployment: one per (provider, interface kind, upstream model)
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDeployment {
    /// Public model group name
    pub model_name: String,
    /// Credential the deployment authenticates with
    pub credential_name: String,
    pub litellm_params: Map<String, Value>,
    pub model_info: Map<String, Value>,
}

impl ModelDeployment {
    /// Upstream `<kind>/<model>` string
    pub fn upstream(&self) -> &str {
        self.litellm_params
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Remote identity of a deployment: group name, credential, upstream model
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.model_name, &self.credential_name, self.upstream())
    }

    /// Body for `POST /model/new`, stamped with audit fields
    pub fn payload(&self, actor: &str) -> Value {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut model_info = self.model_info.clone();
        model_info.insert("updated_at".to_string(), json!(now));
        model_info.insert("updated_by".to_string(), json!(actor));
        model_info.insert("created_at".to_string(), json!(now));
        model_info.insert("created_by".to_string(), json!(actor));
        json!({
            "model_name": self.model_name,
            "litellm_params": self.litellm_params,
            "model_info": model_info,
        })
    }

    /// Request body without audit fields
    pub fn to_value(&self) -> Value {
        json!({
            "model_name": self.model_name,
            "litellm_params": self.litellm_params,
            "model_info": self.model_info,
        })
    }
}

/// User-facing model name mapped to a `<provider>/<model>` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub target: String,
}

/// Any entity the reconciler can create, update or delete
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Credential(Credential),
    Model(ModelDeployment),
    Alias(Alias),
    Fallback(FallbackChain),
}

impl Entity {
    /// Category this entity is synced under
    pub fn category(&self) -> Category {
        match self {
            Entity::Credential(_) => Category::Credentials,
            Entity::Model(_) => Category::Models,
            Entity::Alias(_) => Category::Aliases,
            Entity::Fallback(_) => Category::Fallbacks,
        }
    }

    /// Human-readable identity used in reports and errors
    pub fn key(&self) -> String {
        match self {
            Entity::Credential(c) => c.name.clone(),
            Entity::Model(m) => {
                format!("{} ({}, {})", m.model_name, m.credential_name, m.upstream())
            }
            Entity::Alias(a) => a.name.clone(),
            Entity::Fallback(f) => f.source.clone(),
        }
    }

    /// Desired content, with secrets left out
    pub fn describe(&self) -> Value {
        match self {
            Entity::Credential(c) => json!({
                "credential_name": c.name,
                "api_base": c.api_base,
                "custom_llm_provider": c.custom_llm_provider,
            }),
            Entity::Model(m) => m.to_value(),
            Entity::Alias(a) => {
                let mut map = Map::new();
                map.insert(a.name.clone(), json!(a.target));
                Value::Object(map)
            }
            Entity::Fallback(f) => f.to_value(),
        }
    }
}

/// Everything the local configuration says the gateway should contain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    pub credentials: Vec<Credential>,
    pub models: Vec<ModelDeployment>,
    pub aliases: Vec<Alias>,
    pub fallbacks: Vec<FallbackChain>,
}

impl DesiredState {
    /// Flatten providers into credentials and model deployments.
    ///
    /// Providers without an API key contribute nothing.
    pub fn from_config(config: &MergedConfig) -> Self {
        let mut state = DesiredState::default();

        for (service_name, provider) in &config.providers {
            if !provider.is_active() {
                debug!("Skipping provider without api_key: {}", service_name);
                continue;
            }
            let api_key = provider.api_key.clone().unwrap_or_default();

            for (kind, interface) in &provider.interfaces {
                let credential_name = kind.credential_name(service_name);
                state.credentials.push(Credential {
                    name: credential_name.clone(),
                    api_key: api_key.clone(),
                    api_base: format!("{}{}", provider.api_base, kind.path_suffix()),
                    custom_llm_provider: kind.custom_llm_provider().to_string(),
                });

                for (upstream_id, model) in &interface.models {
                    let model_name = model.model_name.clone().unwrap_or_else(|| upstream_id.clone());

                    let mut model_info = model.model_info.clone();
                    let base_model = model_info
                        .get("base_model")
                        .and_then(Value::as_str)
                        .filter(|b| !b.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| model_name.clone());
                    model_info.insert("base_model".to_string(), json!(base_model));
                    match &model.access_groups {
                        Some(groups) if !groups.is_empty() => {
                            model_info.insert("access_groups".to_string(), json!(groups));
                        }
                        _ => {
                            model_info.shift_remove("access_groups");
                        }
                    }

                    let mut litellm_params = model.litellm_params.clone();
                    litellm_params.insert(
                        "model".to_string(),
                        json!(format!("{}/{}", kind.config_key(), upstream_id)),
                    );
                    litellm_params.insert(
                        "litellm_credential_name".to_string(),
                        json!(credential_name),
                    );

                    state.models.push(ModelDeployment {
                        model_name,
                        credential_name: credential_name.clone(),
                        litellm_params,
                        model_info,
                    });
                }
            }
        }

        state.aliases = config
            .aliases
            .iter()
            .map(|(name, target)| Alias {
                name: name.clone(),
                target: target.clone(),
            })
            .collect();
        state.fallbacks = config.fallbacks.clone();
        state
    }

    /// Every entity in one category, in declaration order
    pub fn entities(&self, category: Category) -> Vec<Entity> {
        match category {
            Category::Credentials => self.credentials.iter().cloned().map(Entity::Credential).collect(),
            Category::Models => self.models.iter().cloned().map(Entity::Model).collect(),
            Category::Aliases => self.aliases.iter().cloned().map(Entity::Alias).collect(),
            Category::Fallbacks => self.fallbacks.iter().cloned().map(Entity::Fallback).collect(),
        }
    }

    /// Resolved document as written by `render`, API keys included
    pub fn to_document(&self) -> Value {
        let aliases: Map<String, Value> = self
            .aliases
            .iter()
            .map(|a| (a.name.clone(), json!(a.target)))
            .collect();
        json!({
            "credentials": self.credentials.iter().map(Credential::payload).collect::<Vec<_>>(),
            "models": self.models.iter().map(ModelDeployment::to_value).collect::<Vec<_>>(),
            "aliases": aliases,
            "fallbacks": self.fallbacks.iter().map(FallbackChain::to_value).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(value: Value) -> MergedConfig {
        MergedConfig::from_layers(&value, None).unwrap()
    }

    #[test]
    fn test_credentials_per_interface() {
        let state = DesiredState::from_config(&config(json!({
            "providers": {
                "antigravity": {
                    "api_base": "http://antigravity:8045",
                    "api_key": "sk-ag",
                    "interfaces": {"openai": null, "gemini": {}, "anthropic": {}}
                },
                "inactive": {"api_base": "http://x", "interfaces": {"openai": {}}}
            }
        })));

        let names: Vec<&str> = state.credentials.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["antigravity-openai", "antigravity-gemini", "antigravity-anthropic"]
        );
        assert_eq!(state.credentials[0].api_base, "http://antigravity:8045/v1");
        assert_eq!(state.credentials[1].api_base, "http://antigravity:8045/v1beta");
        assert_eq!(state.credentials[2].api_base, "http://antigravity:8045");
        assert_eq!(state.credentials[1].custom_llm_provider, "Google_AI_Studio");
    }

    #[test]
    fn test_model_deployment_shape() {
        let state = DesiredState::from_config(&config(json!({
            "providers": {
                "ag": {
                    "api_base": "http://ag",
                    "api_key": "k",
                    "access_groups": ["General"],
                    "interfaces": {"anthropic": {"models": {
                        "gemini-claude-opus-4-5-thinking": {
                            "model_name": "claude-opus-4-5",
                            "litellm_params": {"max_tokens": 64000}
                        },
                        "gemini-3-pro-preview": null
                    }}}
                }
            }
        })));

        assert_eq!(state.models.len(), 2);
        let opus = &state.models[0];
        assert_eq!(
            opus.identity(),
            (
                "claude-opus-4-5",
                "ag-anthropic",
                "anthropic/gemini-claude-opus-4-5-thinking"
            )
        );
        assert_eq!(
            Value::Object(opus.litellm_params.clone()),
            json!({
                "max_tokens": 64000,
                "model": "anthropic/gemini-claude-opus-4-5-thinking",
                "litellm_credential_name": "ag-anthropic"
            })
        );
        assert_eq!(
            Value::Object(opus.model_info.clone()),
            json!({"base_model": "claude-opus-4-5", "access_groups": ["General"]})
        );
        assert_eq!(state.models[1].model_name, "gemini-3-pro-preview");
    }

    #[test]
    fn test_empty_access_groups_omitted() {
        let state = DesiredState::from_config(&config(json!({
            "providers": {"p": {"api_key": "k", "access_groups": [],
                "interfaces": {"openai": {"models": {"m": null}}}}}
        })));
        assert!(!state.models[0].model_info.contains_key("access_groups"));
    }

    #[test]
    fn test_model_payload_has_audit_fields() {
        let model = ModelDeployment {
            model_name: "m".to_string(),
            credential_name: "p-openai".to_string(),
            litellm_params: Map::new(),
            model_info: Map::new(),
        };
        let payload = model.payload("admin");
        let info = &payload["model_info"];
        assert_eq!(info["created_by"], "admin");
        assert_eq!(info["updated_by"], "admin");
        let created = info["created_at"].as_str().unwrap();
        assert!(created.ends_with('Z'));
        assert_eq!(created, info["updated_at"].as_str().unwrap());
    }

    #[test]
    fn test_credential_description_hides_key() {
        let entity = Entity::Credential(Credential {
            name: "p-openai".to_string(),
            api_key: "sk-secret".to_string(),
            api_base: "http://p/v1".to_string(),
            custom_llm_provider: "OpenAI_Compatible".to_string(),
        });
        assert!(!entity.describe().to_string().contains("sk-secret"));
        assert_eq!(entity.category(), Category::Credentials);
    }

    #[test]
    fn test_render_document() {
        let state = DesiredState::from_config(&config(json!({
            "aliases": {"claude-opus-4-5": "anthropic/claude-opus-4-5-20251101"},
            "fallbacks": [{"claude-opus-4-5": ["gemini-3-pro-preview"]}]
        })));
        let doc = state.to_document();
        assert_eq!(doc["aliases"]["claude-opus-4-5"], "anthropic/claude-opus-4-5-20251101");
        assert_eq!(doc["fallbacks"], json!([{"claude-opus-4-5": ["gemini-3-pro-preview"]}]));
        assert_eq!(doc["credentials"], json!([]));
    }
}
