// SnapshotStore - persisted session state on disk
//
// The file holds Playwright's storage-state JSON (cookies and local storage).
// It is read at most once per run and written at most once after a fresh login.

use crate::error::{Error, Result};
use playwright_rs::StorageState;
use std::path::{Path, PathBuf};

/// Location of the persisted session snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<StorageState> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Io(e).context(format!("Reading {}", self.path.display())))?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::Snapshot(format!("{} is not a storage state: {}", self.path.display(), e))
        })
    }

    /// Writes the state as pretty JSON, creating parent directories as needed.
    pub fn save(&self, state: &StorageState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)?;
        tracing::info!(
            "Session snapshot saved to {} ({} cookies)",
            self.path.display(),
            state.cookies.len()
        );
        Ok(())
    }

    /// Removes the snapshot. A missing file is not an error.
    pub fn invalidate(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Session snapshot {} removed", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playwright_rs::Cookie;

    fn session_cookie() -> Cookie {
        Cookie {
            name: "session".to_string(),
            value: "abc123".to_string(),
            domain: "app.grabdocs.com".to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: true,
            secure: true,
            same_site: Some("Lax".to_string()),
        }
    }

    #[test]
    fn test_save_creates_directories_and_load_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join(".auth").join("storage-state.json"));
        assert!(!store.exists());

        let state = StorageState {
            cookies: vec![session_cookie()],
            origins: vec![],
        };
        store.save(&state).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.cookies.len(), 1);
        assert_eq!(loaded.cookies[0].name, "session");
        assert!(loaded.cookies[0].http_only);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"httpOnly\": true"));
    }

    #[test]
    fn test_corrupt_snapshot_is_a_snapshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage-state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state.json"));
        std::fs::write(store.path(), "{\"cookies\":[],\"origins\":[]}").unwrap();

        store.invalidate().unwrap();
        assert!(!store.exists());
        store.invalidate().unwrap();
    }
}
