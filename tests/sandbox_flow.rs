//! End-to-end flows over the sandbox backend
//!
//! Connects a real client to the in-process services and exercises each
//! surface the way the REPL does: todo sync with optimistic overlays,
//! streaming chat, recipe generation, haiku, and file upload/listing.

use std::sync::Arc;
use std::time::Duration;

use nimbus::ai::{GenerationPhase, Role, SessionState};
use nimbus::auth::{AuthProvider, AuthSession};
use nimbus::records::TodoRecord;
use nimbus::sandbox::{self, SandboxAuth, SandboxCollection};
use nimbus::services::{CollectionService, ServiceBundle};
use nimbus::{Client, RemoteError};

const WAIT: Duration = Duration::from_secs(5);

fn session() -> AuthSession {
    SandboxAuth::new("pat").current_session()
}

struct Harness {
    client: Arc<Client>,
    collection: Arc<SandboxCollection>,
    _data_dir: tempfile::TempDir,
}

async fn connect() -> Harness {
    let data_dir = tempfile::tempdir().unwrap();
    let mut services: ServiceBundle = sandbox::bundle(data_dir.path());
    let collection = Arc::new(SandboxCollection::new());
    services.collection = collection.clone();

    let client = Client::connect(session(), services).await.unwrap();
    Harness {
        client,
        collection,
        _data_dir: data_dir,
    }
}

/// Await the visible todo set satisfying `predicate`.
async fn wait_for_todos<F>(client: &Client, predicate: F) -> Vec<TodoRecord>
where
    F: Fn(&[TodoRecord]) -> bool,
{
    let mut rx = client.store().subscribe();
    tokio::time::timeout(WAIT, async {
        loop {
            let todos = rx.borrow_and_update().clone();
            if predicate(&todos) {
                return todos;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("store never reached the expected state")
}

#[tokio::test]
async fn test_create_and_delete_round_trip() {
    let h = connect().await;

    let record = h.client.gateway().create("buy milk").await.unwrap();
    assert!(record.id.starts_with("todo-"));
    let todos = wait_for_todos(&h.client, |t| t.len() == 1 && t[0].id == record.id).await;
    assert_eq!(todos[0].content, "buy milk");

    h.client.gateway().delete(&record.id).await.unwrap();
    wait_for_todos(&h.client, |t| t.is_empty()).await;
}

#[tokio::test]
async fn test_empty_create_uses_default_content() {
    let h = connect().await;

    let record = h.client.gateway().create("  ").await.unwrap();
    assert_eq!(record.content, "My new Todo");
}

#[tokio::test]
async fn test_external_writes_are_pushed() {
    let h = connect().await;

    // Another device writes to the same account.
    h.collection.create("from elsewhere", true).await.unwrap();

    let todos = wait_for_todos(&h.client, |t| t.len() == 1).await;
    assert_eq!(todos[0].content, "from elsewhere");
    assert!(todos[0].is_done);
}

#[tokio::test]
async fn test_failed_create_leaves_no_residue() {
    let h = connect().await;

    h.collection.fail_next(RemoteError::Transient);
    let err = h.client.gateway().create("doomed").await.unwrap_err();
    assert!(err.is_transient());

    assert!(h.client.store().visible().is_empty());
    // The backend never saw it either.
    h.collection.create("probe", false).await.unwrap();
    let todos = wait_for_todos(&h.client, |t| !t.is_empty()).await;
    assert_eq!(todos.len(), 1);
}

#[tokio::test]
async fn test_failed_delete_restores_record() {
    let h = connect().await;

    let record = h.client.gateway().create("keep me").await.unwrap();
    wait_for_todos(&h.client, |t| t.len() == 1).await;

    h.collection.fail_next(RemoteError::Transient);
    h.client.gateway().delete(&record.id).await.unwrap_err();

    let todos = h.client.store().visible();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].id, record.id);
}

#[tokio::test]
async fn test_streaming_chat_two_turns() {
    let h = connect().await;
    let chat = h.client.conversation();

    chat.send_message("hello there").await.unwrap();
    let turns = chat.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].role, Role::Assistant);
    assert!(turns[1].complete);
    assert!(turns[1].content.contains("hello there"));

    chat.send_message("and again").await.unwrap();
    let turns = chat.turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(chat.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_recipe_generation_settles() {
    let h = connect().await;
    let generator = h.client.generator();
    let mut rx = generator.subscribe();

    generator.request("spicy tomato pasta".into()).unwrap();

    let view = tokio::time::timeout(WAIT, async {
        loop {
            let view = rx.borrow_and_update().clone();
            if view.phase == GenerationPhase::Idle && view.result.is_some() {
                return view;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("generation never settled");

    assert_eq!(view.result.unwrap().name, "Spicy Tomato Pasta");
}

#[tokio::test]
async fn test_haiku_is_three_lines() {
    let h = connect().await;
    let haiku = h.client.haiku("first snow").await.unwrap();
    assert_eq!(haiku.lines().count(), 3);
}

#[tokio::test]
async fn test_upload_appears_in_listing() {
    let h = connect().await;
    let files = h.client.files();

    files.refresh().await.unwrap();
    assert!(files.entries().is_empty());

    files.upload("notes.txt", b"hello".to_vec()).await.unwrap();
    let entries = files.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "private/sbx-pat/notes.txt");
}

#[tokio::test]
async fn test_shutdown_freezes_the_view() {
    let h = connect().await;

    h.collection.create("before", false).await.unwrap();
    wait_for_todos(&h.client, |t| t.len() == 1).await;

    h.client.shutdown();
    h.collection.create("after", false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let todos = h.client.store().visible();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].content, "before");
}
