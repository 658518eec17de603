//! Client composition root
//!
//! Owns the live subscription and wires the per-surface state machines to
//! their services. A dropped subscription goes quiet rather than pretending
//! the collection emptied; resuming is always an explicit [`Client::resubscribe`]
//! by the embedder, never an automatic retry loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai::{ConversationSession, RecipeGenerator};
use crate::auth::AuthSession;
use crate::error::RemoteError;
use crate::files::FileCache;
use crate::records::{MutationGateway, RecordStore};
use crate::services::ServiceBundle;

/// Unresolved overlays older than this are dropped as abandoned.
const OVERLAY_MAX_AGE_MS: i64 = 30_000;
/// How often the expiry sweep runs.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

pub struct Client {
    session: AuthSession,
    services: ServiceBundle,
    store: Arc<RecordStore>,
    gateway: MutationGateway,
    conversation: Arc<ConversationSession>,
    generator: Arc<RecipeGenerator>,
    files: Arc<FileCache>,
    pump: Mutex<Option<JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connect as `session`: open the collection subscription, start the
    /// snapshot pump, and build the state machines over `services`.
    pub async fn connect(
        session: AuthSession,
        services: ServiceBundle,
    ) -> Result<Arc<Self>, RemoteError> {
        if !session.is_authenticated {
            return Err(RemoteError::Unauthenticated);
        }

        let store = Arc::new(RecordStore::new());
        let gateway = MutationGateway::new(services.collection.clone(), store.clone());
        let conversation = Arc::new(ConversationSession::new(
            services.conversation.clone(),
            Uuid::new_v4().to_string(),
        ));
        let generator = RecipeGenerator::new(services.generation.clone());
        let files = FileCache::new(services.files.clone(), session.storage_prefix());

        let client = Arc::new(Self {
            session,
            services,
            store,
            gateway,
            conversation,
            generator,
            files,
            pump: Mutex::new(None),
            sweeper: Mutex::new(None),
        });

        client.start_pump().await?;
        client.start_sweeper();
        info!(user = %client.session.username, "client connected");
        Ok(client)
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn conversation(&self) -> &Arc<ConversationSession> {
        &self.conversation
    }

    pub fn generator(&self) -> &Arc<RecipeGenerator> {
        &self.generator
    }

    pub fn files(&self) -> &Arc<FileCache> {
        &self.files
    }

    /// One-shot free-text generation.
    pub async fn haiku(&self, prompt: &str) -> Result<String, RemoteError> {
        self.services.text.query(prompt).await
    }

    /// Re-open the collection subscription after the previous one went
    /// quiet. The store keeps its sequence cursor, so replayed state from
    /// the new subscription cannot roll the view backwards.
    pub async fn resubscribe(&self) -> Result<(), RemoteError> {
        info!("resubscribing to collection");
        self.start_pump().await
    }

    /// Tear everything down. In-flight service calls resolve against closed
    /// components and become no-ops.
    pub fn shutdown(&self) {
        if let Some(pump) = self.pump.lock().unwrap().take() {
            pump.abort();
        }
        if let Some(sweeper) = self.sweeper.lock().unwrap().take() {
            sweeper.abort();
        }
        self.store.close();
        self.conversation.close();
        self.generator.close();
        self.files.close();
        info!("client shut down");
    }

    async fn start_pump(&self) -> Result<(), RemoteError> {
        let mut channel = self.services.collection.subscribe().await?;
        let store = self.store.clone();
        let pump = tokio::spawn(async move {
            while let Some(snapshot) = channel.next_snapshot().await {
                debug!(seq = snapshot.seq(), "snapshot received");
                store.apply_snapshot(snapshot);
            }
            // Silence from here on is a dropped subscription, not an empty
            // collection; the view freezes until an explicit resubscribe.
            warn!("collection subscription closed");
        });
        if let Some(previous) = self.pump.lock().unwrap().replace(pump) {
            previous.abort();
        }
        Ok(())
    }

    fn start_sweeper(&self) {
        let store = self.store.clone();
        let sweeper = tokio::spawn(async move {
            let mut tick = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
            tick.tick().await;
            loop {
                tick.tick().await;
                store.expire_overlays(OVERLAY_MAX_AGE_MS);
            }
        });
        *self.sweeper.lock().unwrap() = Some(sweeper);
    }
}
