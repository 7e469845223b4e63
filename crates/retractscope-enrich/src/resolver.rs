use serde::Serialize;
use tracing::{debug, info, warn};

use retractscope_core::TablePaths;

use crate::error::Result;
use crate::registry::{Lookup, Registry};
use crate::resolved::ResolvedTable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub total: usize,
    /// Already present in the resolved table; no request made.
    pub skipped: usize,
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Saves of the resolved table, including the final one.
    pub checkpoints: usize,
}

impl ResolveReport {
    pub fn looked_up(&self) -> usize {
        self.resolved + self.not_found + self.failed
    }
}

/// Resolves keys against one registry, one request at a time, saving the
/// resolved table every `checkpoint_interval` lookups.
///
/// The resolved table doubles as the cache: a key already present is never
/// requested again, so an interrupted run picks up where the last save left off.
pub struct Resolver<R: Registry> {
    registry: R,
    paths: TablePaths,
    checkpoint_interval: usize,
}

impl<R: Registry> Resolver<R> {
    pub fn new(registry: R, paths: TablePaths, checkpoint_interval: usize) -> Self {
        Self {
            registry,
            paths,
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn paths(&self) -> &TablePaths {
        &self.paths
    }

    /// Load the persisted table for this resolver.
    pub fn load_table(&self) -> Result<ResolvedTable<R::Row>> {
        ResolvedTable::load(&self.paths)
    }

    /// Look up every key of `keys` missing from `table`, in order.
    ///
    /// Failed lookups are logged and left out of the table. Only saving the
    /// table can fail the run.
    pub async fn resolve(
        &self,
        keys: &[String],
        table: &mut ResolvedTable<R::Row>,
    ) -> Result<ResolveReport> {
        let name = self.registry.name();
        let mut report = ResolveReport {
            total: keys.len(),
            ..Default::default()
        };

        for key in keys {
            if table.contains(key) {
                report.skipped += 1;
                continue;
            }

            match self.registry.lookup(key).await {
                Ok(Lookup::Found(row)) => {
                    table.insert(row);
                    report.resolved += 1;
                }
                Ok(Lookup::NotFound) => {
                    debug!("{name}: no match for {key:?}");
                    if let Some(row) = self.registry.not_found_row(key) {
                        table.insert(row);
                    }
                    report.not_found += 1;
                }
                Err(e) => {
                    warn!("{name}: lookup failed for {key:?}: {e}");
                    report.failed += 1;
                }
            }

            let processed = report.looked_up();
            if processed % self.checkpoint_interval == 0 {
                table.save(&self.paths)?;
                report.checkpoints += 1;
                info!(
                    "{name}: checkpoint after {processed} lookups, {} rows saved",
                    table.len()
                );
            }
        }

        table.save(&self.paths)?;
        report.checkpoints += 1;

        info!(
            "{name}: {} keys, {} cached, {} resolved, {} not found, {} failed",
            report.total, report.skipped, report.resolved, report.not_found, report.failed
        );
        Ok(report)
    }
}
