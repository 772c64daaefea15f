//! File system paths for the capture client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the capture client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client files (~/.ahha)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.ahha`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".ahha"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.ahha).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.ahha/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the durable session store path (~/.ahha/session.json).
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_under_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/ahha-test"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/ahha-test/config.json"));
        assert_eq!(paths.session_file(), PathBuf::from("/tmp/ahha-test/session.json"));
    }

    #[test]
    fn test_ensure_dirs_creates_base_dir() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested").join("ahha"));
        paths.ensure_dirs().unwrap();
        assert!(paths.base_dir().is_dir());
    }
}
