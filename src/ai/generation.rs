//! Single-shot recipe generation
//!
//! One structured result or one error, no retained history. Accepting a
//! request synchronously discards whatever was displayed before, and every
//! completion is epoch-guarded: a result belonging to a superseded request
//! is dropped, so stale data can never repopulate the view.

use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::services::{GenerationService, Recipe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    Requesting,
}

/// What a UI would render: the phase plus at most one of result/error.
#[derive(Debug, Clone, Default)]
pub struct GenerationView {
    pub phase: GenerationPhase,
    pub result: Option<Recipe>,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    /// A generation is already in flight; the affordance should be
    /// disabled, not queued.
    #[error("a generation is already in flight")]
    Busy,
    #[error("generator is closed")]
    Closed,
}

struct GenInner {
    phase: GenerationPhase,
    epoch: u64,
    result: Option<Recipe>,
    error: Option<String>,
    closed: bool,
}

/// State machine for the structured-generation surface.
pub struct RecipeGenerator {
    service: Arc<dyn GenerationService>,
    inner: RwLock<GenInner>,
    view_tx: watch::Sender<GenerationView>,
}

impl RecipeGenerator {
    pub fn new(service: Arc<dyn GenerationService>) -> Arc<Self> {
        let (view_tx, _) = watch::channel(GenerationView::default());
        Arc::new(Self {
            service,
            inner: RwLock::new(GenInner {
                phase: GenerationPhase::Idle,
                epoch: 0,
                result: None,
                error: None,
                closed: false,
            }),
            view_tx,
        })
    }

    pub fn view(&self) -> GenerationView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationView> {
        self.view_tx.subscribe()
    }

    /// Start a generation. The previous result or error is discarded
    /// before this returns; the outcome arrives through the view once the
    /// spawned request completes.
    pub fn request(self: &Arc<Self>, description: String) -> Result<(), GenerationError> {
        let epoch = {
            let mut inner = self.inner.write().unwrap();
            if inner.closed {
                return Err(GenerationError::Closed);
            }
            if inner.phase == GenerationPhase::Requesting {
                return Err(GenerationError::Busy);
            }
            inner.epoch += 1;
            inner.phase = GenerationPhase::Requesting;
            inner.result = None;
            inner.error = None;
            self.publish(&inner);
            inner.epoch
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.service.generate(&description).await;
            this.complete(epoch, outcome);
        });
        Ok(())
    }

    /// Abandon the in-flight request (if any) and clear the view. The
    /// abandoned request's eventual completion is dropped by the epoch
    /// guard.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        inner.epoch += 1;
        inner.phase = GenerationPhase::Idle;
        inner.result = None;
        inner.error = None;
        self.publish(&inner);
    }

    /// Tear down: every later completion becomes a no-op.
    pub fn close(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.closed = true;
        inner.epoch += 1;
    }

    fn complete(&self, epoch: u64, outcome: Result<Recipe, RemoteError>) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed || inner.epoch != epoch {
            debug!(epoch, "dropping stale generation completion");
            return;
        }
        inner.phase = GenerationPhase::Idle;
        match outcome {
            Ok(recipe) => inner.result = Some(recipe),
            Err(e) => {
                warn!(error = %e, "generation failed");
                inner.error = Some(e.to_string());
            }
        }
        self.publish(&inner);
    }

    fn publish(&self, inner: &GenInner) {
        self.view_tx.send_replace(GenerationView {
            phase: inner.phase,
            result: inner.result.clone(),
            error: inner.error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Generation fake that blocks each call on an external trigger keyed
    /// by description, so tests control completion order exactly.
    struct GatedGeneration {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<Recipe, RemoteError>>>>,
    }

    #[async_trait]
    impl GenerationService for GatedGeneration {
        async fn generate(&self, description: &str) -> Result<Recipe, RemoteError> {
            let gate = self.gates.lock().unwrap().remove(description).unwrap();
            gate.await.unwrap()
        }
    }

    fn recipe(name: &str) -> Recipe {
        Recipe {
            name: name.into(),
            ingredients: vec!["salt".into()],
            instructions: "mix".into(),
        }
    }

    type Gate = oneshot::Sender<Result<Recipe, RemoteError>>;

    fn gated(descriptions: &[&str]) -> (Arc<RecipeGenerator>, HashMap<String, Gate>) {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for d in descriptions {
            let (tx, rx) = oneshot::channel();
            senders.insert(d.to_string(), tx);
            receivers.insert(d.to_string(), rx);
        }
        let generator = RecipeGenerator::new(Arc::new(GatedGeneration {
            gates: Mutex::new(receivers),
        }));
        (generator, senders)
    }

    async fn wait_idle(generator: &RecipeGenerator) -> GenerationView {
        let mut rx = generator.subscribe();
        loop {
            let view = rx.borrow_and_update().clone();
            if view.phase == GenerationPhase::Idle {
                return view;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_request_rejected_while_in_flight() {
        let (generator, _gates) = gated(&["pasta"]);
        generator.request("pasta".into()).unwrap();

        let err = generator.request("soup".into()).unwrap_err();
        assert!(matches!(err, GenerationError::Busy));
    }

    #[tokio::test]
    async fn test_result_delivered_on_completion() {
        let (generator, mut gates) = gated(&["pasta"]);
        generator.request("pasta".into()).unwrap();
        assert_eq!(generator.view().phase, GenerationPhase::Requesting);

        gates.remove("pasta").unwrap().send(Ok(recipe("Pasta"))).unwrap();
        let view = wait_idle(&generator).await;
        assert_eq!(view.result.unwrap().name, "Pasta");
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_new_request_discards_prior_result_synchronously() {
        let (generator, mut gates) = gated(&["pasta", "soup"]);

        generator.request("pasta".into()).unwrap();
        gates.remove("pasta").unwrap().send(Ok(recipe("Pasta"))).unwrap();
        wait_idle(&generator).await;
        assert!(generator.view().result.is_some());

        // Accepting the second request clears the display before any
        // response can arrive.
        generator.request("soup".into()).unwrap();
        let view = generator.view();
        assert!(view.result.is_none());
        assert!(view.error.is_none());
        assert_eq!(view.phase, GenerationPhase::Requesting);

        gates.remove("soup").unwrap().send(Ok(recipe("Soup"))).unwrap();
        let view = wait_idle(&generator).await;
        assert_eq!(view.result.unwrap().name, "Soup");
    }

    #[tokio::test]
    async fn test_abandoned_request_result_is_never_shown() {
        let (generator, mut gates) = gated(&["pasta", "soup"]);

        // Request A, then abandon it while still in flight.
        generator.request("pasta".into()).unwrap();
        generator.reset();

        // Request B completes first.
        generator.request("soup".into()).unwrap();
        gates.remove("soup").unwrap().send(Ok(recipe("Soup"))).unwrap();
        let view = wait_idle(&generator).await;
        assert_eq!(view.result.as_ref().unwrap().name, "Soup");

        // A resolves late; its result must be dropped.
        gates.remove("pasta").unwrap().send(Ok(recipe("Pasta"))).unwrap();
        tokio::task::yield_now().await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(generator.view().result.as_ref().unwrap().name, "Soup");
    }

    #[tokio::test]
    async fn test_failure_surfaces_error_and_returns_idle() {
        let (generator, mut gates) = gated(&["pasta"]);
        generator.request("pasta".into()).unwrap();

        gates
            .remove("pasta")
            .unwrap()
            .send(Err(RemoteError::Rejected("no such cuisine".into())))
            .unwrap();
        let view = wait_idle(&generator).await;
        assert!(view.result.is_none());
        assert!(view.error.unwrap().contains("no such cuisine"));
    }

    #[tokio::test]
    async fn test_closed_generator_drops_completions() {
        let (generator, mut gates) = gated(&["pasta"]);
        generator.request("pasta".into()).unwrap();
        generator.close();

        gates.remove("pasta").unwrap().send(Ok(recipe("Pasta"))).unwrap();
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert!(generator.view().result.is_none());
        assert!(matches!(
            generator.request("soup".into()),
            Err(GenerationError::Closed)
        ));
    }
}
