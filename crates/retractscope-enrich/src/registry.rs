use async_trait::async_trait;

use retractscope_core::{OrganizationMatch, Tabular, WorkMetadata};

use crate::error::Result;

/// Outcome of one registry query that got an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// A row addressable by the lookup key that produced it.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for OrganizationMatch {
    fn key(&self) -> &str {
        &self.raw
    }
}

impl Keyed for WorkMetadata {
    fn key(&self) -> &str {
        &self.doi
    }
}

/// An external service that resolves lookup keys into rows.
#[async_trait]
pub trait Registry: Send + Sync {
    type Row: Keyed + Tabular + Clone + Send + Sync;

    fn name(&self) -> &'static str;

    /// Query the registry once for `key`.
    ///
    /// `Err` means no answer was obtained; the key stays unresolved.
    async fn lookup(&self, key: &str) -> Result<Lookup<Self::Row>>;

    /// Row recorded when the registry answers "not found". `None` leaves the
    /// key out of the resolved table so a later run asks again.
    fn not_found_row(&self, _key: &str) -> Option<Self::Row> {
        None
    }
}
