//! Per-invocation read-once file cache.
//!
//! The same fragment can be referenced by several resolution passes within
//! one composition run. The cache is an explicit object threaded through
//! the run rather than a process-wide global, so runs stay independent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{MoorageError, Result};

/// Memoizes file reads keyed by path for the duration of one run.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<PathBuf, String>,
}

impl FileCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `path`, returning the cached contents on repeat access.
    ///
    /// # Errors
    ///
    /// Returns an error if the first read of `path` fails.
    pub fn read(&mut self, path: &Path) -> Result<&str> {
        if !self.entries.contains_key(path) {
            let contents =
                std::fs::read_to_string(path).map_err(|e| MoorageError::io(path, e))?;
            let _ = self.entries.insert(path.to_path_buf(), contents);
        }
        // Entry was just inserted or already present.
        Ok(self
            .entries
            .get(path)
            .map(String::as_str)
            .unwrap_or_default())
    }

    /// Number of distinct files read so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file has been read yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
