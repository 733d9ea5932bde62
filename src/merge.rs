//! Pure tree operations over configuration documents
//!
//! All functions here work on `serde_json::Value` trees so the same rules
//! apply whether a document was written as JSON, YAML or TOML:
//!
//! - [`deep_merge`] layers an override document onto a base document
//! - [`resolve_extends`] expands `$extend` directives between providers
//! - [`inherit_access_groups`] copies provider `access_groups` onto models
//! - [`expand_base_refs`] splices `$base` markers in fallback chains

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Directive naming the provider a definition inherits from
pub const EXTEND_KEY: &str = "$extend";

/// Fallback chain marker replaced by the base document's chain
pub const BASE_REF: &str = "$base";

/// Deep-merge `overlay` onto `base`.
///
/// Objects merge key by key, recursively. Any other value in `overlay`
/// (scalar, list or null) replaces the value in `base` wholesale.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// Resolve every `$extend` directive in a `providers` mapping.
///
/// Parents are resolved depth-first before being merged under the child, so
/// chains of any length collapse correctly. The result keeps declaration
/// order and contains no `$extend` keys.
pub fn resolve_extends(providers: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    for name in providers.keys() {
        let mut path = Vec::new();
        resolve_provider(name, providers, &mut resolved, &mut path)?;
    }

    let mut ordered = Map::new();
    for name in providers.keys() {
        if let Some(value) = resolved.get(name) {
            ordered.insert(name.clone(), value.clone());
        }
    }
    Ok(ordered)
}

fn resolve_provider(
    name: &str,
    providers: &Map<String, Value>,
    resolved: &mut Map<String, Value>,
    path: &mut Vec<String>,
) -> Result<Value> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }

    if let Some(start) = path.iter().position(|p| p == name) {
        let mut cycle = path[start..].to_vec();
        cycle.push(name.to_string());
        return Err(Error::CyclicExtend { cycle });
    }

    let definition = providers.get(name).ok_or_else(|| Error::InvalidConfig {
        key_path: format!("providers.{}", name),
        message: "provider is not declared".to_string(),
    })?;
    if !definition.is_object() {
        return Err(Error::InvalidConfig {
            key_path: format!("providers.{}", name),
            message: "provider definition must be a mapping".to_string(),
        });
    }

    let value = match extend_target(name, definition)? {
        Some(target) => {
            if !providers.contains_key(target) {
                return Err(Error::UnknownExtend {
                    provider: name.to_string(),
                    target: target.to_string(),
                });
            }
            path.push(name.to_string());
            let parent = resolve_provider(target, providers, resolved, path)?;
            path.pop();
            strip_extend(deep_merge(&parent, definition))
        }
        None => strip_extend(definition.clone()),
    };

    resolved.insert(name.to_string(), value.clone());
    Ok(value)
}

/// `null`, missing and empty `$extend` all mean "no parent".
fn extend_target<'a>(name: &str, definition: &'a Value) -> Result<Option<&'a str>> {
    match definition.get(EXTEND_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(target)) if target.is_empty() => Ok(None),
        Some(Value::String(target)) => Ok(Some(target.as_str())),
        Some(_) => Err(Error::InvalidConfig {
            key_path: format!("providers.{}.{}", name, EXTEND_KEY),
            message: "expected a provider name".to_string(),
        }),
    }
}

fn strip_extend(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.shift_remove(EXTEND_KEY);
    }
    value
}

/// Give every model without explicit `access_groups` a copy of its
/// provider's groups.
///
/// Model entries that are not mappings (`null`, `true`) become empty
/// mappings, and `null` interfaces become empty mappings. A model with
/// `access_groups: []` keeps its empty list.
pub fn inherit_access_groups(providers: &mut Map<String, Value>) {
    for provider in providers.values_mut() {
        let Value::Object(provider_map) = provider else {
            continue;
        };
        let groups = provider_map
            .get("access_groups")
            .filter(|g| !g.is_null())
            .cloned();

        let Some(Value::Object(interfaces)) = provider_map.get_mut("interfaces") else {
            continue;
        };

        for interface in interfaces.values_mut() {
            if interface.is_null() {
                *interface = Value::Object(Map::new());
            }
            let Some(Value::Object(models)) = interface.get_mut("models") else {
                continue;
            };

            for model in models.values_mut() {
                if !model.is_object() {
                    *model = Value::Object(Map::new());
                }
                if let Value::Object(model_map) = model {
                    let explicit = model_map
                        .get("access_groups")
                        .is_some_and(|g| !g.is_null());
                    if explicit {
                        continue;
                    }
                    match &groups {
                        Some(groups) => {
                            model_map.insert("access_groups".to_string(), groups.clone());
                        }
                        None => {
                            model_map.shift_remove("access_groups");
                        }
                    }
                }
            }
        }
    }
}

/// Replace `$base` entries in fallback chains with the chain the base
/// document declares for the same source model.
///
/// Both arguments are the `fallbacks` lists (arrays of single-key mappings).
/// Anything that is not shaped like a chain is passed through untouched.
pub fn expand_base_refs(fallbacks: &Value, base_fallbacks: &Value) -> Value {
    let Value::Array(entries) = fallbacks else {
        return fallbacks.clone();
    };

    let mut base_lookup: Map<String, Value> = Map::new();
    if let Value::Array(base_entries) = base_fallbacks {
        for entry in base_entries {
            if let Value::Object(map) = entry {
                for (source, chain) in map {
                    base_lookup.insert(source.clone(), chain.clone());
                }
            }
        }
    }

    let expanded = entries
        .iter()
        .map(|entry| {
            let Value::Object(map) = entry else {
                return entry.clone();
            };
            let mut out = Map::new();
            for (source, chain) in map {
                let value = match chain {
                    Value::Array(items) if items.iter().any(|i| i == BASE_REF) => {
                        let base_items = match base_lookup.get(source) {
                            Some(Value::Array(base_items)) => base_items.clone(),
                            _ => Vec::new(),
                        };
                        let spliced = items
                            .iter()
                            .flat_map(|item| {
                                if item == BASE_REF {
                                    base_items.clone()
                                } else {
                                    vec![item.clone()]
                                }
                            })
                            .collect();
                        Value::Array(spliced)
                    }
                    other => other.clone(),
                };
                out.insert(source.clone(), value);
            }
            Value::Object(out)
        })
        .collect();

    Value::Array(expanded)
}
