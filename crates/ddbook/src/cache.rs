//! Cache slot storage
//!
//! A [`CacheStore`] maps a [`PageKey`] to the raw bytes of a previously
//! fetched page. [`FileCacheStore`] keeps one file per key in a directory;
//! [`MemoryCacheStore`] keeps everything in memory for tests and dry runs.

use crate::error::ConvertError;
use crate::types::PageKey;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// File name prefix for cache slots
pub const CACHE_FILE_PREFIX: &str = "ddb-";

/// File extension for cache slots
pub const CACHE_FILE_EXTENSION: &str = "html";

/// Key-value store for fetched pages
pub trait CacheStore: Send + Sync {
    /// Read a slot; `Ok(None)` when it does not exist
    fn get(&self, key: &PageKey) -> Result<Option<Vec<u8>>, ConvertError>;

    /// Replace a slot's content as a whole
    ///
    /// Readers never observe a partially written slot.
    fn put(&self, key: &PageKey, content: &[u8]) -> Result<(), ConvertError>;
}

/// Cache slots stored as `<dir>/ddb-<key>.html`
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the OS temporary directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Path of the slot for `key`
    pub fn slot_path(&self, key: &PageKey) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}",
            CACHE_FILE_PREFIX, key, CACHE_FILE_EXTENSION
        ))
    }
}

impl Default for FileCacheStore {
    fn default() -> Self {
        Self::in_temp_dir()
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &PageKey) -> Result<Option<Vec<u8>>, ConvertError> {
        match fs::read(self.slot_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConvertError::Cache(e)),
        }
    }

    fn put(&self, key: &PageKey, content: &[u8]) -> Result<(), ConvertError> {
        fs::create_dir_all(&self.dir).map_err(ConvertError::Cache)?;

        // Stage next to the slot so the rename stays on one filesystem
        let mut staged = tempfile::Builder::new()
            .prefix(CACHE_FILE_PREFIX)
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(ConvertError::Cache)?;
        staged.write_all(content).map_err(ConvertError::Cache)?;
        staged.flush().map_err(ConvertError::Cache)?;
        staged
            .persist(self.slot_path(key))
            .map_err(|e| ConvertError::Cache(e.error))?;
        Ok(())
    }
}

/// In-memory cache slots
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    slots: Mutex<HashMap<PageKey, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored slots
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &PageKey) -> Result<Option<Vec<u8>>, ConvertError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| ConvertError::Cache(std::io::Error::other("cache lock poisoned")))?;
        Ok(slots.get(key).cloned())
    }

    fn put(&self, key: &PageKey, content: &[u8]) -> Result<(), ConvertError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| ConvertError::Cache(std::io::Error::other("cache lock poisoned")))?;
        slots.insert(key.clone(), content.to_vec());
        Ok(())
    }
}
