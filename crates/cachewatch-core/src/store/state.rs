use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::CacheRecord;

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. Never fails: a missing file, unreadable file or
    /// malformed JSON yields an empty list, and individual records of the
    /// wrong shape are skipped.
    pub fn load(&self) -> Vec<CacheRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read state file");
                return Vec::new();
            }
        };

        let items: Vec<Value> = match serde_json::from_str(&contents) {
            Ok(items) => items,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is not a JSON array, starting empty");
                return Vec::new();
            }
        };

        let total = items.len();
        let records: Vec<CacheRecord> = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed cache record");
                    None
                }
            })
            .collect();

        debug!(path = %self.path.display(), loaded = records.len(), total, "Loaded state file");
        records
    }

    /// Overwrite the state file with the full record list.
    pub fn save(&self, records: &[CacheRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory {}", parent.display())
                })?;
            }
        }
        let contents = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;
        debug!(path = %self.path.display(), records = records.len(), "Saved state file");
        Ok(())
    }
}
