//! Durable session storage for the capture client.
//!
//! This crate provides the key-value backends and the typed stores built on
//! top of them:
//! - **FileStore**: JSON file with atomic replace, survives restarts
//! - **MemoryStore**: volatile, for tests and ephemeral sessions
//! - **TokenStore**: the four session fields
//! - **NonceStore**: the single in-flight login nonce

mod file;
mod keys;
mod memory;
mod nonce;
mod token_store;
mod traits;

pub use file::FileStore;
pub use keys::SessionKeys;
pub use memory::MemoryStore;
pub use nonce::{generate_nonce, NonceStore, NONCE_LENGTH};
pub use token_store::{SessionField, SessionState, SessionUpdate, TokenStore};
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let storage = MemoryStore::new();

        storage.set("test_key", "test_value").unwrap();
        assert_eq!(storage.get("test_key").unwrap(), Some("test_value".to_string()));

        assert!(storage.has("test_key").unwrap());
        assert!(!storage.has("nonexistent").unwrap());

        assert!(storage.delete("test_key").unwrap());
        assert!(!storage.delete("test_key").unwrap());
        assert_eq!(storage.get("test_key").unwrap(), None);
    }

    #[test]
    fn test_memory_store_apply() {
        let storage = MemoryStore::new();
        storage.set("a", "1").unwrap();

        storage
            .apply(&[("a", None), ("b", Some("2".to_string()))])
            .unwrap();

        assert_eq!(storage.get("a").unwrap(), None);
        assert_eq!(storage.get("b").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_session_keys_are_unique() {
        let keys = vec![
            SessionKeys::AUTH_TOKEN,
            SessionKeys::ID_TOKEN,
            SessionKeys::TOKEN_EXPIRY_TIME,
            SessionKeys::USER_LOGGED_IN,
            SessionKeys::OAUTH_NONCE,
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "Session keys must be unique");
    }
}
