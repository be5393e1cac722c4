//! A user turn end to end: session -> streaming client -> mock completion API.

use fdi_engine::{ChatSession, FALLBACK_REPLY, SessionPhase, persistence_channel};
use fdi_providers::{ApiConfig, MISSING_API_KEY_MESSAGE, OpenRouterClient};
use fdi_types::{ApiKey, NavigationAction, Role};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{TEST_API_KEY, client_for, mount_streaming_completion};

#[tokio::test]
async fn streamed_reply_is_cleaned_and_yields_navigation_action() {
    let server = MockServer::start().await;
    mount_streaming_completion(
        &server,
        &[
            "We offer three",
            " core services.",
            "\n[NAV:/services|View Services]",
        ],
    )
    .await;

    let (outbox, _intents) = persistence_channel();
    let mut session = ChatSession::new(client_for(&server, TEST_API_KEY), outbox);
    assert!(session.send("What services do you offer?").await);

    let rendered = session.rendered_messages();
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0].role, Role::User);
    assert_eq!(rendered[0].content, "What services do you offer?");
    assert_eq!(rendered[1].role, Role::Assistant);
    assert_eq!(rendered[1].content, "We offer three core services.");
    assert_eq!(
        rendered[1].actions,
        vec![NavigationAction {
            path: "/services".to_string(),
            label: "View Services".to_string(),
        }]
    );
    assert_eq!(session.phase(), SessionPhase::AwaitingInput);
}

#[tokio::test]
async fn empty_credential_answers_with_configuration_error_offline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (outbox, _intents) = persistence_channel();
    let mut session = ChatSession::new(client_for(&server, ""), outbox);
    assert!(session.send("Hello?").await);

    let rendered = session.rendered_messages();
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[1].content, MISSING_API_KEY_MESSAGE);
    assert!(rendered[1].actions.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn http_error_status_is_recorded_as_reply_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let (outbox, _intents) = persistence_channel();
    let mut session = ChatSession::new(client_for(&server, TEST_API_KEY), outbox);
    session.send("Hi").await;

    assert_eq!(
        session.messages()[1].content(),
        "Error: API request failed (429). Please try again."
    );
}

#[tokio::test]
async fn unreachable_provider_yields_fallback_reply() {
    let config = ApiConfig::new(Some(ApiKey::new(TEST_API_KEY)))
        .with_endpoint("http://127.0.0.1:1/api/v1/chat/completions");
    let client = OpenRouterClient::with_http_client(config, reqwest::Client::new());

    let (outbox, _intents) = persistence_channel();
    let mut session = ChatSession::new(client, outbox);
    session.send("Anyone there?").await;

    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[1].content(), FALLBACK_REPLY);
    assert_eq!(session.phase(), SessionPhase::AwaitingInput);
}
