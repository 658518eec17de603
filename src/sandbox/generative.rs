//! Sandbox generative services
//!
//! Deterministic stand-ins for the AI endpoints. The assistant streams its
//! reply word by word with a small pacing delay so the client's streaming
//! path is exercised for real; recipes and haikus are derived from the
//! input text so tests can assert on them.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::RemoteError;
use crate::services::{ChunkEvent, ConversationService, GenerationService, Recipe, TextService};

/// Pacing between streamed words.
const CHUNK_DELAY: Duration = Duration::from_millis(15);

pub struct SandboxAssistant;

impl SandboxAssistant {
    fn compose(text: &str) -> String {
        let words = text.split_whitespace().count();
        format!(
            "I hear you: \"{}\". That was {} word{}. What else is on your mind?",
            text.trim(),
            words,
            if words == 1 { "" } else { "s" }
        )
    }
}

#[async_trait]
impl ConversationService for SandboxAssistant {
    async fn send(
        &self,
        _conversation_id: &str,
        text: &str,
    ) -> Result<mpsc::Receiver<ChunkEvent>, RemoteError> {
        let reply = Self::compose(text);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            let chunks = stream! {
                let mut first = true;
                for word in reply.split_whitespace() {
                    let delta = if first {
                        word.to_string()
                    } else {
                        format!(" {word}")
                    };
                    first = false;
                    yield ChunkEvent::Delta(delta);
                    tokio::time::sleep(CHUNK_DELAY).await;
                }
                yield ChunkEvent::Done;
            };
            futures::pin_mut!(chunks);
            while let Some(event) = chunks.next().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

/// Derives one structured recipe from the free-text description.
pub struct SandboxRecipes;

#[async_trait]
impl GenerationService for SandboxRecipes {
    async fn generate(&self, description: &str) -> Result<Recipe, RemoteError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(RemoteError::Rejected("description must not be empty".into()));
        }

        let mut ingredients: Vec<String> = description
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > 2)
            .collect();
        ingredients.dedup();
        ingredients.push("salt and pepper".into());

        Ok(Recipe {
            name: title_case(description),
            ingredients,
            instructions: format!(
                "Combine everything you have for \"{description}\", season to taste, \
                 and cook until it looks right."
            ),
        })
    }
}

/// Templated three-line haiku.
pub struct SandboxHaiku;

#[async_trait]
impl TextService for SandboxHaiku {
    async fn query(&self, prompt: &str) -> Result<String, RemoteError> {
        let subject = prompt.trim();
        if subject.is_empty() {
            return Err(RemoteError::Rejected("prompt must not be empty".into()));
        }
        Ok(format!(
            "{subject} waits here\nquiet lines assemble slow\nthe cursor blinks on"
        ))
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
