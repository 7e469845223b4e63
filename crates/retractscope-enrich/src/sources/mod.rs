pub mod crossref;
pub mod retraction_watch;
pub mod ror;

pub use crossref::CrossRefSource;
pub use retraction_watch::{RefreshOutcome, RetractionWatchSource};
pub use ror::RorSource;
