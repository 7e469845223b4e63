//! Retractscope Enrich: registry lookups and merging for Retraction Watch records.

pub mod error;
pub mod http;
pub mod identifiers;
pub mod keys;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod resolved;
pub mod resolver;
pub mod sources;

pub use error::{EnrichError, Result};
pub use keys::{KeySet, LookupKey, extract_keys};
pub use pipeline::{MergeReport, Pipeline, PipelineReport};
pub use reconcile::ReconcileReport;
pub use registry::{Keyed, Lookup, Registry};
pub use resolved::ResolvedTable;
pub use resolver::{ResolveReport, Resolver};
