//! Error taxonomy for remote calls
//!
//! Every service implementation converts its transport failures into one of
//! these kinds before returning; no raw transport error crosses a trait
//! boundary. A failed call only ever affects the one operation that issued
//! it - the local store is never invalidated wholesale by a single error.

use thiserror::Error;

/// Outcome classification for any remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network failure or timeout. Retryable, but only by explicit user
    /// action - nothing in the client retries automatically.
    #[error("network unavailable or request timed out")]
    Transient,

    /// The service refused the request (validation or authorization).
    /// Not retryable without changing the input.
    #[error("rejected by the service: {0}")]
    Rejected(String),

    /// The session is no longer valid; the caller should prompt for
    /// re-authentication.
    #[error("not authenticated")]
    Unauthenticated,

    /// Catch-all for anything the taxonomy doesn't cover. Logged and
    /// surfaced as a generic message.
    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl RemoteError {
    /// True when retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Transient.is_transient());
        assert!(!RemoteError::Rejected("bad input".into()).is_transient());
        assert!(!RemoteError::Unauthenticated.is_transient());
    }

    #[test]
    fn test_display_messages() {
        let e = RemoteError::Rejected("content too long".into());
        assert!(e.to_string().contains("content too long"));
    }
}
