use std::collections::HashMap;

use retractscope_core::TablePaths;
use retractscope_core::storage::{load_table_or_empty, save_table};

use crate::error::Result;
use crate::registry::Keyed;

/// Append-only table of registry answers keyed by lookup key.
///
/// Rows keep insertion order so saved tables are stable across runs.
#[derive(Debug, Clone)]
pub struct ResolvedTable<R> {
    rows: Vec<R>,
    index: HashMap<String, usize>,
}

impl<R> Default for ResolvedTable<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: Keyed> ResolvedTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rows; later duplicates of a key are ignored.
    pub fn from_rows(rows: impl IntoIterator<Item = R>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.insert(row);
        }
        table
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.index.get(key).map(|&idx| &self.rows[idx])
    }

    /// Insert `row` unless its key is already present. Returns whether it was added.
    pub fn insert(&mut self, row: R) -> bool {
        if self.index.contains_key(row.key()) {
            return false;
        }
        self.index.insert(row.key().to_string(), self.rows.len());
        self.rows.push(row);
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(Keyed::key)
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: Keyed + retractscope_core::Tabular> ResolvedTable<R> {
    /// Load the Parquet form; a missing file is an empty table.
    pub fn load(paths: &TablePaths) -> Result<Self> {
        Ok(Self::from_rows(load_table_or_empty::<R>(&paths.parquet)?))
    }

    pub fn save(&self, paths: &TablePaths) -> Result<()> {
        save_table(&self.rows, paths)?;
        Ok(())
    }
}
