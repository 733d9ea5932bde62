//! Mock LiteLLM management API for testing the gateway client offline

use crate::settings::Settings;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Admin key the mock expects clients to send
pub const ADMIN_KEY: &str = "sk-test-admin";

/// LiteLLM gateway mock server
pub struct GatewayMockServer {
    server: MockServer,
}

impl GatewayMockServer {
    /// Create a new gateway mock server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of this mock server
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Settings pointing at this mock server
    pub fn settings(&self) -> Settings {
        Settings::new(self.base_url(), ADMIN_KEY)
    }

    async fn mock_get(&self, endpoint: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Setup `GET /credentials`
    pub async fn mock_credentials(&self, body: Value) {
        self.mock_get("/credentials", body).await;
    }

    /// Setup `GET /v2/model/info`
    pub async fn mock_models(&self, body: Value) {
        self.mock_get("/v2/model/info", body).await;
    }

    /// Setup `GET /router/settings`
    pub async fn mock_router_settings(&self, body: Value) {
        self.mock_get("/router/settings", body).await;
    }

    /// Setup `GET /key/info`
    pub async fn mock_key_info(&self, body: Value) {
        self.mock_get("/key/info", body).await;
    }

    /// Setup `GET /user/list`
    pub async fn mock_user_list(&self, body: Value) {
        self.mock_get("/user/list", body).await;
    }

    /// Respond to a POST with a fixed body
    pub async fn mock_post(&self, endpoint: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Accept every POST and DELETE not mocked more specifically
    pub async fn accept_writes(&self) {
        for verb in ["POST", "DELETE"] {
            Mock::given(method(verb))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .mount(&self.server)
                .await;
        }
    }

    /// Setup an error status for one endpoint
    pub async fn mock_status(&self, verb: &str, endpoint: &str, status: u16) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({"detail": "mock error"})),
            )
            .mount(&self.server)
            .await;
    }

    /// Setup a response that arrives after `delay`
    pub async fn mock_slow(&self, verb: &str, endpoint: &str, delay: Duration) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Answer the first matching request with 429; later mocks take over
    pub async fn mock_rate_limited_once(&self, verb: &str, endpoint: &str) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Requests received for one method and path, in arrival order
    pub async fn requests(&self, verb: &str, endpoint: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == endpoint)
            .collect()
    }
}
