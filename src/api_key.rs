//! User onboarding: find or create a gateway user and issue an API key

use crate::client::HttpGateway;
use crate::{Error, Result};
use serde_json::Value;
use tracing::{info, warn};

/// A freshly generated key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKey {
    pub user_id: String,
    pub key_alias: String,
    /// The secret key, shown once
    pub key: String,
    /// Whether the user had to be created first
    pub user_created: bool,
}

/// Default key alias: the local part of the email address
pub fn default_key_alias(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn string_field(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Find the user with exactly `email`, creating it when absent, then
/// generate a key for it.
pub async fn create_api_key(
    gateway: &HttpGateway,
    email: &str,
    key_alias: Option<&str>,
) -> Result<IssuedKey> {
    if !email.contains('@') {
        return Err(Error::InvalidConfig {
            key_path: "email".to_string(),
            message: format!("not an email address: {}", email),
        });
    }
    let key_alias = key_alias.unwrap_or_else(|| default_key_alias(email)).to_string();
    info!("Processing: {}", email);

    // A failed lookup is treated like a missing user
    let existing = match gateway.find_user_by_email(email).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Error checking user: {}", e);
            None
        }
    };

    let (user, user_created) = match existing {
        Some(user) => (user, false),
        None => {
            info!("Creating new user...");
            (gateway.create_user(email).await?, true)
        }
    };
    let user_id = string_field(&user, "user_id")
        .ok_or_else(|| Error::Api(format!("No user_id for {}", email)))?;
    if user_created {
        info!("User created: {}", user_id);
    } else {
        info!("User already exists: {}", user_id);
    }

    let generated = gateway.generate_key(&user_id, &key_alias).await?;
    let key = string_field(&generated, "key")
        .ok_or_else(|| Error::Api("key/generate returned no key".to_string()))?;
    info!("API key created");

    Ok(IssuedKey {
        user_id,
        key_alias,
        key,
        user_created,
    })
}
