//! Credential store
//!
//! Persists the one current session on top of a key-value medium. Absence of
//! a session is a normal state, so `load` never fails: unreadable or corrupt
//! data is logged and reported as no session.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::medium::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use crate::models::Session;

/// Key the session is stored under
pub const SESSION_KEY: &str = "session";

/// Durable store for the current session
#[derive(Clone)]
pub struct CredentialStore {
    medium: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(medium: Arc<dyn KeyValueStore>) -> Self {
        Self { medium }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// Store backed by a JSON file
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        let medium = FileKeyValueStore::new(path);
        debug!("Session file: {}", medium.path().display());
        Self::new(Arc::new(medium))
    }

    /// Overwrite the stored session
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let value = serde_json::to_string(session)?;
        self.medium.set(SESSION_KEY, &value)?;
        debug!("Session saved");
        Ok(())
    }

    /// Load the stored session, if any
    pub fn load(&self) -> Option<Session> {
        let raw = match self.medium.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read stored session, treating as absent: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if !session.access_token.is_empty() => Some(session),
            Ok(_) => {
                warn!("Stored session has an empty access token, treating as absent");
                None
            }
            Err(e) => {
                warn!("Stored session is corrupt, treating as absent: {}", e);
                None
            }
        }
    }

    /// Remove the stored session. Idempotent.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.medium.remove(SESSION_KEY)?;
        debug!("Session cleared");
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
