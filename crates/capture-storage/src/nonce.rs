//! Storage for the login nonce.

use crate::{KeyValueStore, SessionKeys, StorageResult};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

/// Length of a generated nonce.
pub const NONCE_LENGTH: usize = 32;

/// Generate a random alphanumeric nonce.
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Holds at most one outstanding nonce, bound to the login in flight.
#[derive(Clone)]
pub struct NonceStore {
    storage: Arc<dyn KeyValueStore>,
}

impl NonceStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Generate a fresh nonce and persist it, replacing any earlier one.
    pub fn issue(&self) -> StorageResult<String> {
        let nonce = generate_nonce();
        self.storage.set(SessionKeys::OAUTH_NONCE, &nonce)?;
        tracing::debug!("Issued login nonce");
        Ok(nonce)
    }

    /// Read the stored nonce without consuming it.
    pub fn peek(&self) -> StorageResult<Option<String>> {
        Ok(self
            .storage
            .get(SessionKeys::OAUTH_NONCE)?
            .filter(|nonce| !nonce.is_empty()))
    }

    /// Remove the stored nonce. Clearing an absent nonce succeeds.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(SessionKeys::OAUTH_NONCE)?;
        Ok(())
    }
}
