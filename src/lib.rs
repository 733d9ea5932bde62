//! Declarative sync of credentials, models, aliases and fallbacks into a
//! LiteLLM gateway.
mod api_key;
mod apply;
mod client;
mod config;
mod diff;
mod merge;
mod provider;
mod reconcile;
mod remote;
mod settings;
mod state;

#[cfg(test)]
mod mock_server;

use std::path::PathBuf;
use thiserror::Error;

/// Result type for litellm-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for litellm-sync operations
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not well-formed
    #[error("Failed to parse {} at {location}: {message}", path.display())]
    ConfigParse {
        path: PathBuf,
        location: String,
        message: String,
    },

    /// The merged configuration has the wrong shape at a key path
    #[error("Invalid configuration at {key_path}: {message}")]
    InvalidConfig { key_path: String, message: String },

    /// `$extend` directives form a cycle
    #[error("Cyclic $extend: {}", cycle.join(" -> "))]
    CyclicExtend { cycle: Vec<String> },

    /// `$extend` names a provider that is not declared
    #[error("Provider '{provider}' extends non-existent provider '{target}'")]
    UnknownExtend { provider: String, target: String },

    /// A required environment variable is missing
    #[error("Environment variable {name} is not set")]
    MissingEnv { name: String },

    /// An environment variable has an unusable value
    #[error("Environment variable {name} is invalid: {message}")]
    InvalidEnv { name: String, message: String },

    /// The initial remote state could not be fetched
    #[error("Gateway unavailable ({endpoint}): {reason}")]
    RemoteUnavailable { endpoint: String, reason: String },

    /// API error
    #[error("API error: {0}")]
    Api(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use api_key::{create_api_key, default_key_alias, IssuedKey};
pub use apply::{Applier, ApplyAction, ApplyError, ApplyReport, CategorySummary};
pub use client::{Gateway, HttpGateway};
pub use config::{
    load_layers, load_merged, local_override_path, FallbackChain, InterfaceDefinition, MergedConfig,
    ModelOverride, ProviderDefinition,
};
pub use diff::{diff, dangling_references, Category, CategoryChanges, ChangeSet, Delete, DiffOptions, Update};
pub use merge::{deep_merge, expand_base_refs, inherit_access_groups, resolve_extends};
pub use provider::InterfaceKind;
pub use reconcile::{plan, Plan};
pub use remote::{RemoteCredential, RemoteModel, RemoteState};
pub use settings::Settings;
pub use state::{Alias, Credential, DesiredState, Entity, ModelDeployment};
