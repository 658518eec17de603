//! Authentication boundary
//!
//! Identity is an external collaborator: the client core only ever sees an
//! [`AuthSession`] value threaded explicitly into its constructor, never an
//! ambient global. The provider trait exists so the binary can swap in a
//! real identity layer without touching the core.

/// A snapshot of the signed-in user, as reported by the identity provider.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Opaque stable id, used to scope private storage paths.
    pub user_id: String,
    /// Display name (the original login id).
    pub username: String,
    pub is_authenticated: bool,
}

impl AuthSession {
    /// Private storage prefix owned by this user.
    pub fn storage_prefix(&self) -> String {
        format!("private/{}/", self.user_id)
    }
}

/// Identity provider contract.
pub trait AuthProvider: Send + Sync {
    fn current_session(&self) -> AuthSession;
    fn sign_out(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_prefix_is_user_scoped() {
        let session = AuthSession {
            user_id: "u-123".into(),
            username: "pat".into(),
            is_authenticated: true,
        };
        assert_eq!(session.storage_prefix(), "private/u-123/");
    }
}
