use chrono::Local;
use serde::Serialize;
use tracing::info;

use retractscope_core::etl::{self, EtlReport};
use retractscope_core::sample::{SampleReport, sample_records};
use retractscope_core::storage::{load_table_or_empty, require_table, save_table};
use retractscope_core::{CheckpointStore, PipelineConfig, Record};

use crate::error::Result;
use crate::keys::extract_keys;
use crate::reconcile::{ReconcileReport, apply_work_metadata, carry_forward, reconcile};
use crate::resolver::{ResolveReport, Resolver};
use crate::sources::{CrossRefSource, RefreshOutcome, RetractionWatchSource, RorSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub reconcile: ReconcileReport,
    /// Records that already carried identities from the previous output.
    pub carried_forward: usize,
    /// Records dropped because CrossRef does not know their DOI.
    pub dropped: usize,
    pub written: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub refresh: Option<RefreshOutcome>,
    pub etl: Option<EtlReport>,
    pub sample: Option<SampleReport>,
    pub institutions: Option<ResolveReport>,
    pub dois: Option<ResolveReport>,
    pub merge: Option<MergeReport>,
}

/// The end-to-end enrichment run: download, ETL, registry resolution, merge.
///
/// Each stage reads its inputs from and writes its outputs to `data_dir`, so
/// stages can also be run one at a time.
pub struct Pipeline {
    config: PipelineConfig,
    source: RetractionWatchSource,
    ror: Resolver<RorSource>,
    crossref: Resolver<CrossRefSource>,
}

impl Pipeline {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let source = RetractionWatchSource::new(
            &config.source.csv_url,
            &config.raw_csv_path(),
            config.source.timeout(),
        )?;
        let ror = Resolver::new(
            RorSource::new(&config.ror)?,
            config.ror_table(),
            config.ror.checkpoint_interval,
        );
        let crossref = Resolver::new(
            CrossRefSource::new(&config.crossref)?,
            config.crossref_table(),
            config.crossref.checkpoint_interval,
        );

        Ok(Self {
            config: config.clone(),
            source,
            ror,
            crossref,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download the upstream CSV unless it was already fetched today.
    pub async fn refresh_source(
        &self,
        checkpoints: &mut CheckpointStore,
    ) -> Result<RefreshOutcome> {
        self.source.refresh(checkpoints, Local::now()).await
    }

    /// Normalise the raw CSV into the record table.
    pub fn run_etl(&self) -> Result<EtlReport> {
        let (records, report) =
            etl::run_etl(&self.config.raw_csv_path(), &self.config.polyfill_path())?;
        let paths = self.config.etl_table();
        save_table(&records, &paths)?;
        info!("wrote {} records to {}", records.len(), paths.parquet.display());
        Ok(report)
    }

    /// Write a seeded random subset of the record table.
    pub fn sample(&self) -> Result<SampleReport> {
        let settings = &self.config.sample;
        let (records, report) =
            sample_records(self.load_records()?, settings.size, settings.seed);
        let paths = self.config.sampled_table();
        save_table(&records, &paths)?;
        info!(
            "wrote {} sampled records to {}",
            records.len(),
            paths.parquet.display()
        );
        Ok(report)
    }

    fn load_records(&self) -> Result<Vec<Record>> {
        Ok(require_table(&self.config.etl_table().parquet)?)
    }

    pub async fn resolve_institutions(&self) -> Result<ResolveReport> {
        let keys = extract_keys(&self.load_records()?);
        info!("{} distinct institution strings", keys.institutions.len());

        let mut table = self.ror.load_table()?;
        self.ror.resolve(&keys.institutions, &mut table).await
    }

    pub async fn resolve_dois(&self) -> Result<ResolveReport> {
        let keys = extract_keys(&self.load_records()?);
        info!("{} distinct DOIs", keys.dois.len());

        let mut table = self.crossref.load_table()?;
        self.crossref.resolve(&keys.dois, &mut table).await
    }

    /// Join both resolved tables onto the records and write the enriched table.
    ///
    /// Reads the sampled table instead of the full one when
    /// `sample.merge_sampled` is set.
    pub fn merge(&self) -> Result<MergeReport> {
        let mut records: Vec<Record> =
            require_table(&self.config.merge_input_table().parquet)?;
        let organizations = self.ror.load_table()?;
        let works = self.crossref.load_table()?;

        let output = self.config.enriched_table();
        let previous: Vec<Record> = load_table_or_empty(&output.parquet)?;
        let carried_forward = carry_forward(&mut records, &previous);

        let reconcile = reconcile(&mut records, &organizations);
        let (records, dropped) = apply_work_metadata(records, &works);
        save_table(&records, &output)?;

        info!(
            "merge: {} institution mentions matched, {} unmatched, {} records dropped, {} written",
            reconcile.matched_mentions,
            reconcile.unmatched_mentions,
            dropped,
            records.len()
        );
        Ok(MergeReport {
            reconcile,
            carried_forward,
            dropped,
            written: records.len(),
        })
    }

    pub async fn run_all(&self) -> Result<PipelineReport> {
        let mut checkpoints = CheckpointStore::load(&self.config.checkpoint_path());

        let refresh = self.refresh_source(&mut checkpoints).await?;
        let etl = self.run_etl()?;
        let sample = if self.config.sample.merge_sampled {
            Some(self.sample()?)
        } else {
            None
        };
        let institutions = self.resolve_institutions().await?;
        let dois = self.resolve_dois().await?;
        let merge = self.merge()?;

        Ok(PipelineReport {
            refresh: Some(refresh),
            etl: Some(etl),
            sample,
            institutions: Some(institutions),
            dois: Some(dois),
            merge: Some(merge),
        })
    }
}
