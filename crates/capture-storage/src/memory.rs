//! In-memory storage backend.

use crate::{KeyValueStore, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Volatile key-value store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().unwrap();
        Ok(data.remove(key).is_some())
    }

    fn apply(&self, changes: &[(&str, Option<String>)]) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        for (key, value) in changes {
            match value {
                Some(value) => {
                    data.insert(key.to_string(), value.clone());
                }
                None => {
                    data.remove(*key);
                }
            }
        }
        Ok(())
    }
}
