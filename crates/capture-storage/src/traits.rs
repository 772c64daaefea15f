//! Storage trait definitions.

use crate::StorageResult;

/// Durable key-value storage backend.
pub trait KeyValueStore: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a batch of changes: `Some(value)` stores, `None` deletes.
    ///
    /// A single caller never observes the batch half-applied. Backends that
    /// can commit a batch in one write override this loop.
    fn apply(&self, changes: &[(&str, Option<String>)]) -> StorageResult<()> {
        for (key, value) in changes {
            match value {
                Some(value) => self.set(key, value)?,
                None => {
                    self.delete(key)?;
                }
            }
        }
        Ok(())
    }

    /// Delete several keys. Missing keys are ignored.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        let changes: Vec<(&str, Option<String>)> = keys.iter().map(|key| (*key, None)).collect();
        self.apply(&changes)
    }
}
