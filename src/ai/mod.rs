//! Generative-AI state machines
//!
//! Two asynchronous response modes with very different shapes: the
//! multi-turn streaming conversation (assistant text grows in place while
//! chunks arrive) and the single-shot structured recipe generation (one
//! typed result, replaced wholesale on every new request).

mod conversation;
mod generation;

pub use conversation::{ConversationSession, Role, SessionError, SessionState, Turn};
pub use generation::{GenerationError, GenerationPhase, GenerationView, RecipeGenerator};
