//! On-disk tier.
//!
//! Layout: one file per cache key, named exactly after the key, directly
//! inside the storage folder.
//!
//! ```text
//! .memoize/
//!   3c9f...e1      # encoded return value
//!   persistent-add
//! ```
//!
//! There is no locking. Two processes writing the same key race and the
//! last rename wins.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MemoizeError, MemoizeResult};
use crate::key::TEMP_SUFFIX;

#[derive(Debug, Clone)]
pub struct DiskStore {
    folder: PathBuf,
}

impl DiskStore {
    /// Use `folder`, creating it (and missing parents) if absent.
    pub fn open(folder: impl Into<PathBuf>) -> MemoizeResult<Self> {
        let store = Self {
            folder: folder.into(),
        };
        store.ensure_folder()?;
        Ok(store)
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.folder.join(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Raw bytes stored under `key`, if any.
    pub fn read(&self, key: &str) -> MemoizeResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).map_err(|e| MemoizeError::storage(&path, "read cache entry", e))?;
        Ok(Some(bytes))
    }

    /// Store `bytes` under `key` unless an entry already exists.
    ///
    /// Returns whether a file was written. The write goes to a temp file
    /// first so a failed write never leaves a truncated entry behind.
    pub fn write_if_absent(&self, key: &str, bytes: &[u8]) -> MemoizeResult<bool> {
        let path = self.path_for(key);
        if path.exists() {
            return Ok(false);
        }
        self.ensure_folder()?;

        let temp_path = self.folder.join(format!("{}{}", key, TEMP_SUFFIX));
        fs::write(&temp_path, bytes)
            .map_err(|e| MemoizeError::storage(&temp_path, "write temp file", e))?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            discard_temp(key, &temp_path);
            return Err(MemoizeError::storage(&path, "rename temp file", e));
        }

        debug!(key, path = %path.display(), bytes = bytes.len(), "persisted cache entry");
        Ok(true)
    }

    /// Delete the folder and everything in it. No error if it is absent.
    pub fn remove_all(&self) -> MemoizeResult<()> {
        if self.folder.exists() {
            fs::remove_dir_all(&self.folder)
                .map_err(|e| MemoizeError::storage(&self.folder, "remove storage folder", e))?;
            debug!(folder = %self.folder.display(), "removed storage folder");
        }
        Ok(())
    }

    pub fn ensure_folder(&self) -> MemoizeResult<()> {
        if !self.folder.is_dir() {
            fs::create_dir_all(&self.folder)
                .map_err(|e| MemoizeError::storage(&self.folder, "create storage folder", e))?;
        }
        Ok(())
    }

    /// Keys of all stored entries, sorted. In-flight temp files are skipped.
    pub fn keys(&self) -> MemoizeResult<Vec<String>> {
        if !self.folder.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.folder)
            .map_err(|e| MemoizeError::storage(&self.folder, "read storage folder", e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| MemoizeError::storage(&self.folder, "read directory entry", e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            keys.push(name);
        }
        keys.sort();
        Ok(keys)
    }
}

/// Best-effort removal of an in-flight temp file; returns whether it is gone.
fn discard_temp(key: &str, temp_path: &Path) -> bool {
    match fs::remove_file(temp_path) {
        Ok(()) => true,
        Err(e) => {
            debug!(
                key,
                path = %temp_path.display(),
                error = %e,
                "failed to remove temp file, it may be left behind"
            );
            false
        }
    }
}
