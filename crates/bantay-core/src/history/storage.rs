// ── Durable history storage ──
//
// Key/value persistence for the history logs. Each key holds one JSON
// array (newest first). Writes are synchronous so append order on disk
// matches processing order.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::error::CoreError;

pub const MOTION_KEY: &str = "history_motion";
pub const ENV_KEY: &str = "history_env";

pub trait HistoryStorage: Send + Sync {
    /// Stored value for `key`, or `None` if never written.
    fn read(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CoreError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

// ── Files ────────────────────────────────────────────────────────────

/// One `{key}.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl HistoryStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::storage(key, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| CoreError::storage(key, e))?;

        // Write-then-rename: the visible file is always complete.
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| CoreError::storage(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| CoreError::storage(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::storage(key, e)),
        }
    }
}

// ── Memory ───────────────────────────────────────────────────────────

/// Process-local storage. Writes can be made to fail for exercising
/// degraded paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: DashMap<String, String>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl HistoryStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::storage(key, "storage is read-only"));
        }
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::storage(key, "storage is read-only"));
        }
        self.values.remove(key);
        Ok(())
    }
}
