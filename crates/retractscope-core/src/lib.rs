pub mod config;
pub mod error;
pub mod etl;
pub mod models;
pub mod sample;
pub mod storage;

pub use config::{PipelineConfig, RegistryConfig, SampleConfig, SourceConfig};
pub use error::{Result, RetractscopeError};
pub use models::*;

pub use storage::checkpoint::{CheckpointStore, RW_DOWNLOAD};
pub use storage::table::{TablePaths, Tabular};
