//! In-process sandbox backend
//!
//! Implements every remote contract locally so the binary runs with no
//! network at all: a broadcasting todo collection, deterministic generative
//! services, and directory-backed file storage. Useful for the REPL and for
//! end-to-end tests; a real deployment swaps this bundle for network
//! clients.

mod collection;
mod generative;
mod storage;

pub use collection::SandboxCollection;
pub use generative::{SandboxAssistant, SandboxHaiku, SandboxRecipes};
pub use storage::SandboxStorage;

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::auth::{AuthProvider, AuthSession};
use crate::services::ServiceBundle;

/// Local identity provider: one signed-in user, derived from a login name.
pub struct SandboxAuth {
    session: RwLock<AuthSession>,
}

impl SandboxAuth {
    pub fn new(username: &str) -> Self {
        Self {
            session: RwLock::new(AuthSession {
                user_id: format!("sbx-{username}"),
                username: username.to_string(),
                is_authenticated: true,
            }),
        }
    }
}

impl AuthProvider for SandboxAuth {
    fn current_session(&self) -> AuthSession {
        self.session.read().unwrap().clone()
    }

    fn sign_out(&self) {
        self.session.write().unwrap().is_authenticated = false;
    }
}

/// Build the full service bundle over one data directory. Todos persist in
/// `todos.json`; uploaded files land under their key paths.
pub fn bundle(data_dir: &Path) -> ServiceBundle {
    ServiceBundle {
        collection: Arc::new(SandboxCollection::load(&data_dir.join("todos.json"))),
        conversation: Arc::new(SandboxAssistant),
        generation: Arc::new(SandboxRecipes),
        text: Arc::new(SandboxHaiku),
        files: Arc::new(SandboxStorage::new(data_dir.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_out_clears_authentication() {
        let auth = SandboxAuth::new("pat");
        assert!(auth.current_session().is_authenticated);
        assert_eq!(auth.current_session().user_id, "sbx-pat");

        auth.sign_out();
        assert!(!auth.current_session().is_authenticated);
    }
}
