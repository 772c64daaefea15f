//! JSON file storage backend.
//!
//! The whole store is one JSON object. Every mutation rewrites the file
//! through a temp file and a rename, so a batch lands all at once or not at
//! all. Reads always go to disk: the file is the source of truth across
//! process restarts.

use crate::{KeyValueStore, StorageError, StorageResult};
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

/// Durable key-value store backed by a JSON file.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StorageError::Encoding(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(StorageError::Encoding(format!(
                "{} is not valid JSON: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn update<F>(&self, mutate: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Map<String, Value>) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap();
        let mut map = self.load()?;
        if !mutate(&mut map) {
            return Ok(());
        }

        let content = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        atomic_write(&self.path, &content)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.apply(&[(key, Some(value.to_string()))])
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let map = self.load()?;
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut existed = false;
        self.update(|map| {
            existed = map.remove(key).is_some();
            existed
        })?;
        Ok(existed)
    }

    fn apply(&self, changes: &[(&str, Option<String>)]) -> StorageResult<()> {
        self.update(|map| {
            let mut changed = false;
            for (key, value) in changes {
                match value {
                    Some(value) => {
                        map.insert(key.to_string(), Value::String(value.clone()));
                        changed = true;
                    }
                    None => changed |= map.remove(*key).is_some(),
                }
            }
            changed
        })
    }
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid store file name"))?;

    let tmp_path = dir.join(format!(
        ".{}.ahha.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(&dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}
