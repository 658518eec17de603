//! Remote service contracts
//!
//! The five collaborators the client core consumes, expressed as async
//! traits so the core is implementable against any backend honoring the
//! call/response/error shapes. The bundled sandbox backend implements all
//! of them in-process; a real deployment would put network clients here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::RemoteError;
use crate::records::{SnapshotChannel, TodoRecord};

/// A structured generation result: one typed recipe object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
}

/// One key in the user's private file area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub key: String,
}

/// Access scope for file operations. Only private, per-user storage is in
/// scope for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    Private,
}

/// Events emitted while an assistant reply streams in.
#[derive(Debug, Clone)]
pub enum ChunkEvent {
    /// Partial assistant text, appended in order.
    Delta(String),
    /// Completion marker - the reply is whole.
    Done,
    /// The stream failed mid-flight.
    Error(String),
}

/// Live access to the server-held todo collection.
#[async_trait]
pub trait CollectionService: Send + Sync {
    /// Open a live subscription. The service emits one snapshot of the full
    /// current state first, then a full snapshot after every change.
    async fn subscribe(&self) -> Result<SnapshotChannel, RemoteError>;

    /// Persist a new record; returns it with its server-assigned id.
    async fn create(&self, content: &str, is_done: bool) -> Result<TodoRecord, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Multi-turn conversational AI.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Send one user message; the reply arrives as a lazy sequence of
    /// partial-text chunks terminated by [`ChunkEvent::Done`].
    async fn send(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<mpsc::Receiver<ChunkEvent>, RemoteError>;
}

/// Single-shot structured generation (free text in, one recipe out).
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, description: &str) -> Result<Recipe, RemoteError>;
}

/// Single-shot free-text generation (the haiku endpoint).
#[async_trait]
pub trait TextService: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, RemoteError>;
}

/// Private file storage.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Full listing under a prefix. Never incremental - callers replace
    /// their cached set wholesale.
    async fn list(&self, prefix: &str, scope: AccessScope)
        -> Result<Vec<FileEntry>, RemoteError>;

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError>;
}

/// The collaborator set threaded explicitly into the client.
#[derive(Clone)]
pub struct ServiceBundle {
    pub collection: Arc<dyn CollectionService>,
    pub conversation: Arc<dyn ConversationService>,
    pub generation: Arc<dyn GenerationService>,
    pub text: Arc<dyn TextService>,
    pub files: Arc<dyn FileService>,
}
