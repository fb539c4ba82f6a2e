//! File-backed key-value store.
//!
//! Each key maps to `<directory>/<key>.json`. Writes go to a sibling temp file
//! that is renamed over the target, so a crash mid-write leaves the previous
//! blob intact.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::trace;
use urverk_core::storage::KeyValueStore;
use urverk_core::StorageError;

#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the state directory.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid {
            return Err(StorageError::Backend(format!("invalid storage key '{key}'")));
        }
        Ok(self.directory.join(format!("{key}.json")))
    }
}

fn write_then_rename(tmp: &Path, target: &Path, blob: &str) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(blob.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, target)
}

impl KeyValueStore for FileStore {
    fn save(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        let target = self.path_for(key)?;
        let tmp = target.with_extension("json.tmp");
        if let Err(e) = write_then_rename(&tmp, &target, blob) {
            // Best effort, the write error is returned.
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        trace!(key, bytes = blob.len(), "Stored blob");
        Ok(())
    }

    fn try_load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("state")).unwrap();
        assert_eq!(store.try_load("timing.timers.state.v1").unwrap(), None);

        store.save("timing.timers.state.v1", "{\"timers\":[]}").unwrap();
        store.save("timing.timers.state.v1", "{\"timers\":[1]}").unwrap();
        assert_eq!(
            store.try_load("timing.timers.state.v1").unwrap().as_deref(),
            Some("{\"timers\":[1]}")
        );
        assert!(!dir.path().join("state/timing.timers.state.v1.json.tmp").exists());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.save(key, "x"),
                Err(StorageError::Backend(_))
            ));
        }
    }

    #[test]
    fn test_failed_save_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        // A non-empty directory at the target path makes the rename fail.
        fs::create_dir_all(dir.path().join("k.json/occupied")).unwrap();

        assert!(matches!(store.save("k", "v"), Err(StorageError::Io(_))));
        assert!(!dir.path().join("k.json.tmp").exists());
        assert!(dir.path().join("k.json/occupied").is_dir());
    }

    #[test]
    fn test_reopen_sees_previous_state() {
        let dir = TempDir::new().unwrap();
        FileStore::open(dir.path()).unwrap().save("k", "v").unwrap();
        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.try_load("k").unwrap().as_deref(), Some("v"));
    }
}
