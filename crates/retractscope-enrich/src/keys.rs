//! Deduplicated registry lookup keys drawn from the record table.

use std::collections::HashSet;

use retractscope_core::Record;
use tracing::debug;

use crate::identifiers::Doi;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    Doi(String),
    Institution(String),
}

impl LookupKey {
    pub fn as_str(&self) -> &str {
        match self {
            LookupKey::Doi(key) | LookupKey::Institution(key) => key,
        }
    }
}

/// Lookup keys grouped by kind, each list in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    pub dois: Vec<String>,
    pub institutions: Vec<String>,
}

impl KeySet {
    pub fn iter(&self) -> impl Iterator<Item = LookupKey> + '_ {
        self.dois
            .iter()
            .cloned()
            .map(LookupKey::Doi)
            .chain(self.institutions.iter().cloned().map(LookupKey::Institution))
    }

    pub fn len(&self) -> usize {
        self.dois.len() + self.institutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dois.is_empty() && self.institutions.is_empty()
    }
}

fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, key: &str) {
    if seen.insert(key.to_string()) {
        out.push(key.to_string());
    }
}

/// Institution strings are compared exactly: no case folding, no trimming of
/// the stored key. Whitespace-only entries are skipped.
pub fn extract_keys(records: &[Record]) -> KeySet {
    let mut keys = KeySet::default();
    let mut seen_dois = HashSet::new();
    let mut seen_institutions = HashSet::new();

    for record in records {
        if let Some(doi) = record.doi() {
            if Doi::parse(doi).is_ok() {
                push_unique(&mut keys.dois, &mut seen_dois, doi);
            } else {
                debug!("skipping unparseable DOI {doi:?}");
            }
        }

        for institution in &record.institutions {
            if institution.trim().is_empty() {
                continue;
            }
            push_unique(&mut keys.institutions, &mut seen_institutions, institution);
        }
    }

    keys
}
