//! Conversations survive an unreachable backend via the on-device cache.

use fdi_engine::{ChatSession, persistence_channel, spawn_persistence_worker};
use fdi_store::MigrationOutcome;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    TEST_API_KEY, client_for, mount_streaming_completion, mount_unavailable_backend,
    store_with_backend,
};

#[tokio::test]
async fn conversation_is_listed_from_local_cache_when_backend_is_down() {
    let provider = MockServer::start().await;
    mount_streaming_completion(&provider, &["Happy to help."]).await;
    let backend = MockServer::start().await;
    mount_unavailable_backend(&backend).await;

    let (_, store) = store_with_backend(backend.uri());
    let (outbox, intents) = persistence_channel();
    let worker = spawn_persistence_worker(store.clone(), intents);

    let mut session = ChatSession::new(client_for(&provider, TEST_API_KEY), outbox);
    assert!(session.start_new_conversation());
    assert!(session.send("Can you help me with FDI?").await);
    let id = session.current_conversation_id().cloned().unwrap();

    drop(session);
    worker.await.unwrap();

    let listed = store.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].title, "Can you help me with FDI?...");
    assert_eq!(listed[0].messages.len(), 2);
    assert_eq!(listed[0].messages[1].content(), "Happy to help.");
}

#[tokio::test]
async fn cached_conversations_migrate_once_backend_recovers() {
    let provider = MockServer::start().await;
    mount_streaming_completion(&provider, &["Sure."]).await;
    let backend = MockServer::start().await;

    let (_, store) = store_with_backend(backend.uri());

    // Offline session: every backend call fails.
    {
        let _guard = Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(503))
            .mount_as_scoped(&backend)
            .await;

        let (outbox, intents) = persistence_channel();
        let worker = spawn_persistence_worker(store.clone(), intents);
        let mut session = ChatSession::new(client_for(&provider, TEST_API_KEY), outbox);
        session.send("Tell me about your accelerators").await;
        drop(session);
        worker.await.unwrap();
    }

    Mock::given(method("POST"))
        .and(path("/api/conversations/bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "Migrated 1 conversations",
        })))
        .expect(1)
        .mount(&backend)
        .await;

    assert_eq!(store.migrate_local_to_remote().await, MigrationOutcome::Migrated(1));
    assert_eq!(
        store.migrate_local_to_remote().await,
        MigrationOutcome::AlreadyMigrated
    );
}
