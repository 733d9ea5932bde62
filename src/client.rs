//! Gateway management API client

use crate::config::FallbackChain;
use crate::diff::{Category, Delete, Update};
use crate::remote::{current_router_settings, parse_credentials, parse_models, parse_router_settings, RemoteState};
use crate::settings::Settings;
use crate::state::Entity;
use crate::{Error, Result};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Deployment listing, team models included
const MODELS_ENDPOINT: &str = "v2/model/info?include_team_models=true";

/// Maximum retry attempts for rate-limited requests (HTTP 429)
const MAX_RETRIES: u32 = 3;

/// Build an HTTP client with specified timeout
fn build_http_client(timeout: Duration) -> std::result::Result<HttpClient, reqwest::Error> {
    HttpClient::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// Calculate delay for retry attempt using exponential backoff
fn retry_delay(attempt: u32) -> Duration {
    // 1s, 2s, 4s
    let base_secs = 1u64 << attempt.saturating_sub(1).min(4);
    Duration::from_secs(base_secs)
}

/// Remote side of a reconciliation
#[async_trait::async_trait]
pub trait Gateway: Send + Sync {
    /// Snapshot the entities of the given categories
    async fn fetch_state(&self, categories: &[Category]) -> Result<RemoteState>;

    /// Register a new entity
    async fn create(&self, entity: &Entity) -> Result<()>;

    /// Replace an existing entity with the desired content
    async fn update(&self, update: &Update) -> Result<()>;

    /// Remove an entity
    async fn delete(&self, delete: &Delete) -> Result<()>;
}

/// [`Gateway`] backed by the LiteLLM management HTTP API
pub struct HttpGateway {
    settings: Settings,
    http_client: HttpClient,
    /// Router settings are written whole; writers must not interleave
    router_lock: Mutex<()>,
    actor: OnceCell<String>,
}

impl HttpGateway {
    /// Create a new gateway client
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(HttpGateway {
            http_client: build_http_client(settings.timeout)?,
            settings: settings.clone(),
            router_lock: Mutex::new(()),
            actor: OnceCell::new(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.settings.base_url, endpoint.trim_start_matches('/'))
    }

    /// Send a request, retrying on 429, and return status and parsed body.
    async fn send_raw(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = self.url(endpoint);
        let mut attempt = 0;
        loop {
            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", self.settings.api_key))
                .header("Accept", "application/json");
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!("{} {}", method, url);
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES {
                attempt += 1;
                let delay = retry_delay(attempt);
                tracing::warn!(
                    "Rate limited (429), retrying in {:?} (attempt {}/{})",
                    delay, attempt, MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let text = response.text().await?;
            let value = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };
            return Ok((status, value));
        }
    }

    async fn send(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        let (status, value) = self.send_raw(method.clone(), endpoint, &[], body).await?;
        if !status.is_success() {
            return Err(api_error(&method, endpoint, status, &value));
        }
        Ok(value)
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value> {
        self.send(Method::GET, endpoint, None).await
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, endpoint, Some(body)).await
    }

    /// GET used while building the initial snapshot; any failure is fatal.
    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        self.get_json(endpoint)
            .await
            .map_err(|e| Error::RemoteUnavailable {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// Identity recorded in model audit fields, looked up once per run
    pub async fn actor(&self) -> String {
        self.actor
            .get_or_init(|| async {
                match self.get_json("key/info").await {
                    Ok(body) => {
                        let info = body.get("info");
                        let field = |name: &str| {
                            info.and_then(|i| i.get(name))
                                .and_then(Value::as_str)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                        };
                        field("user_id")
                            .or_else(|| field("team_id"))
                            .unwrap_or_else(|| self.settings.key_prefix())
                    }
                    Err(e) => {
                        tracing::warn!("Failed to get actor from key: {}", e);
                        self.settings.key_prefix()
                    }
                }
            })
            .await
            .clone()
    }

    /// Read-modify-write of the gateway's router settings
    async fn modify_router_settings<F>(&self, modify: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let _guard = self.router_lock.lock().await;
        let body = self.get_json("router/settings").await?;
        let mut settings = current_router_settings(&body);
        modify(&mut settings);
        self.post_json("config/update", &json!({ "router_settings": settings }))
            .await?;
        Ok(())
    }

    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Credential(credential) => {
                self.post_json("credentials", &credential.payload()).await?;
            }
            Entity::Model(model) => {
                let actor = self.actor().await;
                self.post_json("model/new", &model.payload(&actor)).await?;
            }
            Entity::Alias(alias) => {
                let (name, target) = (alias.name.clone(), alias.target.clone());
                self.modify_router_settings(move |s| set_alias(s, &name, &target))
                    .await?;
            }
            Entity::Fallback(chain) => {
                let chain = chain.clone();
                self.modify_router_settings(move |s| set_fallback(s, &chain))
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete_credential(&self, name: &str) -> Result<()> {
        self.send(Method::DELETE, &format!("credentials/{}", name), None)
            .await?;
        Ok(())
    }

    async fn delete_model(&self, id: &str) -> Result<()> {
        self.post_json("model/delete", &json!({ "id": id })).await?;
        Ok(())
    }

    /// Look up a user by exact email; `None` when there is no such user
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<Value>> {
        // user_email is a partial-match filter
        let query = [("user_email", email), ("page", "1"), ("page_size", "100")];
        let (status, body) = self.send_raw(Method::GET, "user/list", &query, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(&Method::GET, "user/list", status, &body));
        }
        let users = body.get("users").and_then(Value::as_array);
        Ok(users.and_then(|users| {
            users
                .iter()
                .find(|u| u.get("user_email").and_then(Value::as_str) == Some(email))
                .cloned()
        }))
    }

    /// Create an internal viewer user without an initial key
    pub async fn create_user(&self, email: &str) -> Result<Value> {
        let payload = json!({
            "user_id": null,
            "user_email": email,
            "user_role": "internal_user_viewer",
            "models": ["General"],
            "auto_create_key": false,
        });
        self.post_json("user/new", &payload).await
    }

    /// Generate an LLM API key for a user
    pub async fn generate_key(&self, user_id: &str, key_alias: &str) -> Result<Value> {
        let payload = json!({
            "user_id": user_id,
            "team_id": null,
            "key_alias": key_alias,
            "models": ["all-team-models"],
            "key_type": "llm_api",
            "metadata": {},
        });
        self.post_json("key/generate", &payload).await
    }
}

fn api_error(method: &Method, endpoint: &str, status: StatusCode, body: &Value) -> Error {
    let body = match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    Error::Api(format!("{} {} failed ({}): {}", method, endpoint, status, body))
}

#[async_trait::async_trait]
impl Gateway for HttpGateway {
    async fn fetch_state(&self, categories: &[Category]) -> Result<RemoteState> {
        let wants = |c: Category| categories.contains(&c);
        // Models are also read to validate alias and fallback targets
        let router_wanted = wants(Category::Aliases) || wants(Category::Fallbacks);

        let credentials = async {
            if wants(Category::Credentials) {
                self.fetch("credentials").await.map(|b| parse_credentials(&b))
            } else {
                Ok(Vec::new())
            }
        };
        let models = async {
            if wants(Category::Models) {
                self.fetch(MODELS_ENDPOINT)
                    .await
                    .map(|b| (parse_models(&b), false))
            } else if router_wanted {
                match self.get_json(MODELS_ENDPOINT).await {
                    Ok(body) => Ok((parse_models(&body), false)),
                    Err(e) => {
                        tracing::warn!("Skipping reference checks, model list unavailable: {}", e);
                        Ok((Vec::new(), true))
                    }
                }
            } else {
                Ok((Vec::new(), false))
            }
        };
        let router = async {
            if router_wanted {
                self.fetch("router/settings")
                    .await
                    .map(|b| parse_router_settings(&b))
            } else {
                Ok(Default::default())
            }
        };

        let (credentials, (models, models_unavailable), (aliases, fallbacks)) =
            tokio::try_join!(credentials, models, router)?;
        tracing::info!(
            "Remote state: {} credentials, {} models, {} aliases, {} fallbacks",
            credentials.len(),
            models.len(),
            aliases.len(),
            fallbacks.len()
        );
        Ok(RemoteState {
            credentials,
            models,
            aliases,
            fallbacks,
            models_unavailable,
        })
    }

    async fn create(&self, entity: &Entity) -> Result<()> {
        self.put_entity(entity).await
    }

    async fn update(&self, update: &Update) -> Result<()> {
        match &update.entity {
            Entity::Credential(credential) => {
                // The gateway has no replace call for credentials
                self.delete_credential(&credential.name).await?;
                self.put_entity(&update.entity).await
            }
            Entity::Model(_) => {
                // Register the replacement before removing the old deployment
                self.put_entity(&update.entity).await?;
                match &update.remote_id {
                    Some(id) => self.delete_model(id).await,
                    None => Ok(()),
                }
            }
            Entity::Alias(_) | Entity::Fallback(_) => self.put_entity(&update.entity).await,
        }
    }

    async fn delete(&self, delete: &Delete) -> Result<()> {
        let id = delete.remote_id.as_deref().unwrap_or(&delete.key);
        match delete.category {
            Category::Credentials => self.delete_credential(id).await,
            Category::Models => self.delete_model(id).await,
            Category::Aliases => {
                let name = delete.key.clone();
                self.modify_router_settings(move |s| remove_alias(s, &name))
                    .await
            }
            Category::Fallbacks => {
                let source = delete.key.clone();
                let keep_first = delete.duplicates_only;
                self.modify_router_settings(move |s| remove_fallback(s, &source, keep_first))
                    .await
            }
        }
    }
}

fn set_alias(settings: &mut Map<String, Value>, name: &str, target: &str) {
    let aliases = settings
        .entry("model_group_alias")
        .or_insert_with(|| Value::Object(Map::new()));
    if !aliases.is_object() {
        *aliases = Value::Object(Map::new());
    }
    let Value::Object(map) = aliases else {
        return;
    };
    // Object-form aliases carry extra flags such as `hidden`; keep them
    match map.get_mut(name) {
        Some(Value::Object(existing)) => {
            existing.insert("model".to_string(), json!(target));
        }
        _ => {
            map.insert(name.to_string(), json!(target));
        }
    }
}

fn remove_alias(settings: &mut Map<String, Value>, name: &str) {
    if let Some(Value::Object(map)) = settings.get_mut("model_group_alias") {
        map.shift_remove(name);
    }
}

/// Replace the chain for `chain.source` in place, or append it.
fn set_fallback(settings: &mut Map<String, Value>, chain: &FallbackChain) {
    let fallbacks = settings
        .entry("fallbacks")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !fallbacks.is_array() {
        *fallbacks = Value::Array(Vec::new());
    }
    let Value::Array(entries) = fallbacks else {
        return;
    };

    let targets = Value::from(chain.targets.clone());
    for entry in entries.iter_mut() {
        if let Value::Object(map) = entry {
            if let Some(existing) = map.get_mut(&chain.source) {
                *existing = targets;
                return;
            }
        }
    }
    entries.push(chain.to_value());
}

/// Remove the entries for `source`; with `keep_first` the first one stays.
fn remove_fallback(settings: &mut Map<String, Value>, source: &str, keep_first: bool) {
    if let Some(Value::Array(entries)) = settings.get_mut("fallbacks") {
        let mut seen = false;
        for entry in entries.iter_mut() {
            if let Value::Object(map) = entry {
                if !map.contains_key(source) {
                    continue;
                }
                if keep_first && !seen {
                    seen = true;
                    continue;
                }
                map.shift_remove(source);
            }
        }
        entries.retain(|entry| !matches!(entry, Value::Object(map) if map.is_empty()));
    }
}
