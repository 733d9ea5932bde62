//! Process-wide settings read once from the environment
//!
//! Environment variables:
//! - `LITELLM_BASE_URL` - gateway base URL (required)
//! - `LITELLM_API_KEY` - admin key sent as a bearer token (required)
//! - `LITELLM_SYNC_TIMEOUT_SECS` - per-request timeout (default: 30)
//! - `LITELLM_SYNC_CONCURRENCY` - in-flight requests per category (default: 10)

use crate::{Error, Result};
use std::time::Duration;

pub const BASE_URL_VAR: &str = "LITELLM_BASE_URL";
pub const API_KEY_VAR: &str = "LITELLM_API_KEY";
pub const TIMEOUT_VAR: &str = "LITELLM_SYNC_TIMEOUT_SECS";
pub const CONCURRENCY_VAR: &str = "LITELLM_SYNC_CONCURRENCY";

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gateway base URL, without trailing slash
    pub base_url: String,

    /// Admin API key
    pub api_key: String,

    /// Timeout applied to every remote call
    pub timeout: Duration,

    /// Upper bound on concurrent creates/updates within one category
    pub concurrency: usize,
}

impl Settings {
    /// Create settings with default timeout and concurrency
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(default_timeout_secs()),
            concurrency: default_concurrency(),
        }
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::MissingEnv {
                    name: name.to_string(),
                })
        };
        let base_url = required(BASE_URL_VAR)?;
        let api_key = required(API_KEY_VAR)?;

        let mut settings = Self::new(base_url, api_key);
        if let Some(secs) = parse_optional::<u64>(&lookup, TIMEOUT_VAR)? {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_optional::<usize>(&lookup, CONCURRENCY_VAR)? {
            if limit == 0 {
                return Err(Error::InvalidEnv {
                    name: CONCURRENCY_VAR.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            settings.concurrency = limit;
        }
        Ok(settings)
    }

    /// Actor recorded when the gateway cannot tell who owns the key
    pub fn key_prefix(&self) -> String {
        self.api_key.chars().take(20).collect()
    }
}

fn parse_optional<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| Error::InvalidEnv {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    10
}
