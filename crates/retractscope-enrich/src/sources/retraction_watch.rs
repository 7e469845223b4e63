use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use retractscope_core::storage::write_atomic;
use retractscope_core::{CheckpointStore, RW_DOWNLOAD};

use crate::error::Result;
use crate::http::{RateLimitedClient, USER_AGENT};

/// What [`RetractionWatchSource::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Already downloaded today; nothing fetched.
    Fresh,
    Downloaded { bytes: usize },
    /// Download failed; any existing local copy is left in place.
    Failed,
}

/// The daily-published Retraction Watch CSV.
pub struct RetractionWatchSource {
    client: RateLimitedClient,
    csv_url: String,
    dest: PathBuf,
}

impl RetractionWatchSource {
    pub fn new(csv_url: &str, dest: &Path, timeout: Duration) -> Result<Self> {
        let client = RateLimitedClient::new(1, Duration::ZERO, timeout, USER_AGENT)?;
        Ok(Self::with_client(csv_url, dest, client))
    }

    pub fn with_client(csv_url: &str, dest: &Path, client: RateLimitedClient) -> Self {
        Self {
            client,
            csv_url: csv_url.to_string(),
            dest: dest.to_path_buf(),
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Download the CSV unless `checkpoints` says it was fetched on `now`'s day.
    ///
    /// A failed download is logged and reported as [`RefreshOutcome::Failed`];
    /// only local write errors are returned.
    pub async fn refresh(
        &self,
        checkpoints: &mut CheckpointStore,
        now: DateTime<Local>,
    ) -> Result<RefreshOutcome> {
        if checkpoints.is_fresh(RW_DOWNLOAD, now) && self.dest.exists() {
            info!("Retraction Watch CSV already downloaded today, skipping");
            return Ok(RefreshOutcome::Fresh);
        }

        info!("downloading Retraction Watch CSV from {}", self.csv_url);
        let bytes = match self.client.get_bytes(&self.csv_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Retraction Watch download failed: {e}");
                return Ok(RefreshOutcome::Failed);
            }
        };

        write_atomic(&self.dest, &bytes)?;
        info!("saved {} bytes to {}", bytes.len(), self.dest.display());

        checkpoints.set(RW_DOWNLOAD, now);
        if let Err(e) = checkpoints.save() {
            warn!(
                "could not save checkpoint file {}: {e}",
                checkpoints.path().display()
            );
        }

        Ok(RefreshOutcome::Downloaded { bytes: bytes.len() })
    }
}
