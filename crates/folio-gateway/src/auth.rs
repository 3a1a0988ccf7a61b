//! Bearer token access for gateway requests.
//!
//! The session core never issues or refreshes tokens. It reads the current
//! token through a `TokenProvider` and reports `401` responses back to it.

use std::sync::RwLock;

/// Source of the process-wide bearer token.
pub trait TokenProvider: Send + Sync {
    /// Current token, if the user is signed in.
    fn bearer_token(&self) -> Option<String>;

    /// Called when the gateway rejects the token with `401`.
    fn on_unauthorized(&self);
}

/// In-memory token slot shared between the auth collaborator and the gateway.
///
/// The auth side calls `set`/`clear`; a `401` from the gateway clears it.
#[derive(Debug, Default)]
pub struct SharedToken {
    token: RwLock<Option<String>>,
}

impl SharedToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        let mut guard = match self.token.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(token.into());
    }

    pub fn clear(&self) {
        let mut guard = match self.token.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }

    pub fn is_signed_in(&self) -> bool {
        self.bearer_token().is_some()
    }
}

impl TokenProvider for SharedToken {
    fn bearer_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn on_unauthorized(&self) {
        tracing::warn!("Gateway rejected the bearer token; clearing it");
        self.clear();
    }
}
