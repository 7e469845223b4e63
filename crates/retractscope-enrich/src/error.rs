use retractscope_core::RetractscopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] RetractscopeError),
}

impl EnrichError {
    /// A 4xx answer other than 429: the registry has answered, and the answer is "no".
    pub fn is_definitive_miss(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status) && *status != 429)
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;
