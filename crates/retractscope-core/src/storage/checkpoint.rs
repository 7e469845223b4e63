use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::error::Result;
use crate::storage::table::write_atomic;

/// Resource name for the upstream Retraction Watch CSV.
pub const RW_DOWNLOAD: &str = "rw-last-downloaded";

/// Last successful fetch per logical resource, persisted as JSON.
#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Local>>,
}

impl CheckpointStore {
    /// Load the store; an unreadable or corrupt file is treated as "never refreshed".
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("ignoring corrupt checkpoint file {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("ignoring unreadable checkpoint file {}: {e}", path.display());
                BTreeMap::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn get(&self, resource: &str) -> Option<DateTime<Local>> {
        self.entries.get(resource).copied()
    }

    pub fn set(&mut self, resource: &str, timestamp: DateTime<Local>) {
        self.entries.insert(resource.to_string(), timestamp);
    }

    /// Whether `resource` was already refreshed on `now`'s calendar day.
    pub fn is_fresh(&self, resource: &str, now: DateTime<Local>) -> bool {
        self.get(resource)
            .is_some_and(|last| last.date_naive() >= now.date_naive())
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
