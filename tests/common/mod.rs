//! Shared test utilities and fixtures
//!
//! Mock servers for the completion endpoint and the conversation backend, plus
//! builders for the real client and store pointed at them.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use fdi_providers::{ApiConfig, OpenRouterClient};
use fdi_store::{ConversationStore, LocalSettings, MemoryKeyValueStore, RemoteBackend, RemoteConfig};
use fdi_types::ApiKey;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";
pub const TEST_API_KEY: &str = "sk-or-v1-integration-test";

/// Streamed chat-completions body delivering `fragments` in order.
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::from(": OPENROUTER PROCESSING\n\n");
    for fragment in fragments {
        let data = serde_json::json!({
            "id": "gen-test",
            "choices": [{ "index": 0, "delta": { "content": fragment } }]
        });
        body.push_str(&format!("data: {data}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

pub async fn mount_streaming_completion(server: &MockServer, fragments: &[&str]) {
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(fragments)),
        )
        .mount(server)
        .await;
}

pub fn client_for(server: &MockServer, api_key: &str) -> OpenRouterClient {
    let config = ApiConfig::new(Some(ApiKey::new(api_key)))
        .with_endpoint(format!("{}{COMPLETIONS_PATH}", server.uri()))
        .with_idle_timeout(Duration::from_secs(5));
    // Fresh client per test: pooled connections must not outlive the test's runtime.
    OpenRouterClient::with_http_client(config, reqwest::Client::new())
}

/// Backend that fails every request with a 503.
pub async fn mount_unavailable_backend(server: &MockServer) {
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(server)
        .await;
}

pub fn store_with_backend(base_url: String) -> (Arc<MemoryKeyValueStore>, Arc<ConversationStore>) {
    let storage = Arc::new(MemoryKeyValueStore::new());
    let settings = Arc::new(LocalSettings::new(storage.clone()));
    let remote = RemoteBackend::from_config(&RemoteConfig {
        base_url: Some(base_url),
        allow_loopback: true,
    });
    (storage, Arc::new(ConversationStore::new(settings, remote)))
}
