use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::table::TablePaths;

/// Config file looked up in the working directory by [`PipelineConfig::load`].
pub const CONFIG_FILE: &str = "retractscope.toml";

/// Root pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub source: SourceConfig,
    pub crossref: RegistryConfig,
    pub ror: RegistryConfig,
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub csv_url: String,
    /// Manual corrections applied during ETL, relative to `data_dir`.
    pub polyfill_csv: String,
    pub timeout_secs: u64,
}

/// Fixed-size random subset of the record table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub size: usize,
    pub seed: u64,
    /// Merge into the sampled table instead of the full one.
    pub merge_sampled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Overrides the registry's public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub requests_per_window: usize,
    pub window_pause_ms: u64,
    pub checkpoint_interval: usize,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            source: SourceConfig::default(),
            crossref: RegistryConfig::default(),
            ror: RegistryConfig::default(),
            sample: SampleConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            csv_url: "https://gitlab.com/crossref/retraction-watch-data/-/raw/main/retraction_watch.csv?ref_type=heads&inline=false".to_string(),
            polyfill_csv: "retraction_watch_polyfill.csv".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            seed: 1,
            merge_sampled: false,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            requests_per_window: 20,
            window_pause_ms: 1000,
            checkpoint_interval: 100,
            timeout_secs: 30,
            polite_email: None,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RegistryConfig {
    pub fn window_pause(&self) -> Duration {
        Duration::from_millis(self.window_pause_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl PipelineConfig {
    /// Load `retractscope.toml` from the working directory, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    /// Raw upstream CSV as downloaded.
    pub fn raw_csv_path(&self) -> PathBuf {
        self.data_dir.join("retraction_watch_raw.csv")
    }

    pub fn polyfill_path(&self) -> PathBuf {
        self.data_dir.join(&self.source.polyfill_csv)
    }

    /// Checkpoint metadata (last successful fetch per resource).
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("metadata.json")
    }

    /// Normalised record table written by the ETL stage.
    pub fn etl_table(&self) -> TablePaths {
        TablePaths::in_dir(&self.data_dir, "retraction_watch_etl")
    }

    pub fn sampled_table(&self) -> TablePaths {
        TablePaths::in_dir(&self.data_dir, "retraction_watch_etl_sampled")
    }

    /// Record table the merge stage reads.
    pub fn merge_input_table(&self) -> TablePaths {
        if self.sample.merge_sampled {
            self.sampled_table()
        } else {
            self.etl_table()
        }
    }

    pub fn ror_table(&self) -> TablePaths {
        TablePaths::in_dir(&self.data_dir, "ror_etl")
    }

    pub fn crossref_table(&self) -> TablePaths {
        TablePaths::in_dir(&self.data_dir, "crossref_etl")
    }

    /// Final merged output.
    pub fn enriched_table(&self) -> TablePaths {
        TablePaths::in_dir(&self.data_dir, "retraction_watch_enriched")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.ror.requests_per_window, 20);
        assert!(cfg.ror.checkpoint_interval > cfg.ror.requests_per_window);
        assert!(cfg.crossref.base_url.is_none());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("retractscope.toml");

        let mut cfg = PipelineConfig::default();
        cfg.ror.checkpoint_interval = 250;
        cfg.crossref.polite_email = Some("ops@example.org".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(loaded.ror.checkpoint_interval, 250);
        assert_eq!(loaded.crossref.polite_email.as_deref(), Some("ops@example.org"));
        assert_eq!(loaded.ror.base_url, cfg.ror.base_url);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("retractscope.toml");
        std::fs::write(
            &path,
            "data_dir = \"/srv/rw\"\n[ror]\nwindow_pause_ms = 2000\nbase_url = \"http://localhost:9000\"\n",
        )
        .unwrap();

        let cfg = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/rw"));
        assert_eq!(cfg.ror.window_pause(), Duration::from_secs(2));
        assert_eq!(cfg.ror.requests_per_window, 20);
        assert_eq!(cfg.ror.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            PipelineConfig::load_from(Path::new("/tmp/nonexistent_retractscope.toml")).unwrap();
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_derived_paths() {
        let cfg = PipelineConfig::default();
        let ror = cfg.ror_table();
        assert!(ror.parquet.to_string_lossy().ends_with("ror_etl.parquet"));
        assert!(ror.csv.to_string_lossy().ends_with("ror_etl.csv"));
        assert!(cfg.checkpoint_path().starts_with("data"));
        assert_eq!(cfg.merge_input_table(), cfg.etl_table());

        let mut cfg = cfg;
        cfg.sample.merge_sampled = true;
        assert!(
            cfg.merge_input_table()
                .parquet
                .ends_with("retraction_watch_etl_sampled.parquet")
        );
    }
}
