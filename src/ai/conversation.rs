//! Conversation session
//!
//! One multi-turn exchange with the assistant. History is append-only from
//! the observer's side: the only in-place mutation ever made is the
//! trailing assistant turn growing while its reply streams in. A failure
//! marks that turn failed-terminal and surfaces an error; it never edits
//! what came before.

use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::services::{ChunkEvent, ConversationService};

/// Where the session is in its send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// User turn appended, waiting for the first reply chunk.
    Sending,
    /// Assistant turn growing.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One message in the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// False only while this (assistant) turn is still streaming.
    pub complete: bool,
    /// The reply failed mid-stream; the turn is terminal as-is.
    pub failed: bool,
}

impl Turn {
    fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            complete: true,
            failed: false,
        }
    }

    fn assistant() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            complete: false,
            failed: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// A message is already in flight; sends are rejected, not queued.
    #[error("a message is already in flight")]
    Busy,
    #[error("session is closed")]
    Closed,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

struct SessionInner {
    turns: Vec<Turn>,
    state: SessionState,
    last_error: Option<RemoteError>,
    closed: bool,
}

/// State machine for one conversation.
pub struct ConversationSession {
    service: Arc<dyn ConversationService>,
    conversation_id: String,
    inner: RwLock<SessionInner>,
    turns_tx: watch::Sender<Vec<Turn>>,
}

impl ConversationSession {
    pub fn new(service: Arc<dyn ConversationService>, conversation_id: String) -> Self {
        let (turns_tx, _) = watch::channel(Vec::new());
        Self {
            service,
            conversation_id,
            inner: RwLock::new(SessionInner {
                turns: Vec::new(),
                state: SessionState::Idle,
                last_error: None,
                closed: false,
            }),
            turns_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().unwrap().state
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.inner.read().unwrap().turns.clone()
    }

    pub fn last_error(&self) -> Option<RemoteError> {
        self.inner.read().unwrap().last_error.clone()
    }

    /// Observe the turn history as it grows.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Turn>> {
        self.turns_tx.subscribe()
    }

    /// Send one user message and drive the streamed reply to completion.
    ///
    /// The user turn is appended synchronously before any network activity
    /// and survives every failure mode. Rejected with [`SessionError::Busy`]
    /// while a previous send is still in flight.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.write().unwrap();
            if inner.closed {
                return Err(SessionError::Closed);
            }
            if inner.state != SessionState::Idle {
                return Err(SessionError::Busy);
            }
            inner.state = SessionState::Sending;
            inner.last_error = None;
            inner.turns.push(Turn::user(text.to_string()));
            self.publish(&inner);
        }

        let rx = match self.service.send(&self.conversation_id, text).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "conversation send failed before streaming");
                self.finish_with_error(e.clone());
                return Err(e.into());
            }
        };

        use futures::StreamExt;
        let mut chunks = ReceiverStream::new(rx);

        while let Some(event) = chunks.next().await {
            match event {
                ChunkEvent::Delta(delta) => {
                    let mut inner = self.inner.write().unwrap();
                    if inner.closed {
                        return Ok(());
                    }
                    if inner.state == SessionState::Sending {
                        inner.state = SessionState::Streaming;
                        inner.turns.push(Turn::assistant());
                    }
                    if let Some(turn) = inner.turns.last_mut() {
                        turn.content.push_str(&delta);
                    }
                    self.publish(&inner);
                }
                ChunkEvent::Done => {
                    let mut inner = self.inner.write().unwrap();
                    if inner.closed {
                        return Ok(());
                    }
                    if let Some(turn) = inner.turns.last_mut() {
                        if turn.role == Role::Assistant {
                            turn.complete = true;
                        }
                    }
                    inner.state = SessionState::Idle;
                    self.publish(&inner);
                    debug!("assistant reply complete");
                    return Ok(());
                }
                ChunkEvent::Error(msg) => {
                    warn!(error = %msg, "stream failed mid-reply");
                    let err = RemoteError::Unknown(msg);
                    self.finish_with_error(err.clone());
                    return Err(err.into());
                }
            }
        }

        // The stream ended without a completion marker: dropped connection.
        warn!("reply stream closed without completion marker");
        self.finish_with_error(RemoteError::Transient);
        Err(RemoteError::Transient.into())
    }

    /// Tear down: in-flight completions become no-ops.
    pub fn close(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.closed = true;
    }

    /// Mark the trailing assistant turn (if any) failed-terminal and return
    /// to idle. The already-appended user turn is never rolled back.
    fn finish_with_error(&self, error: RemoteError) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        if let Some(turn) = inner.turns.last_mut() {
            if turn.role == Role::Assistant && !turn.complete {
                turn.complete = true;
                turn.failed = true;
            }
        }
        inner.state = SessionState::Idle;
        inner.last_error = Some(error);
        self.publish(&inner);
    }

    fn publish(&self, inner: &SessionInner) {
        self.turns_tx.send_replace(inner.turns.clone());
    }
}
