use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use retractscope_core::{CheckpointStore, PipelineConfig};
use retractscope_enrich::{Pipeline, PipelineReport};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "retractscope",
    about = "Enrich Retraction Watch records with CrossRef and ROR metadata",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print the stage report as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Download, normalise, resolve and merge (the default).
    Run,

    /// Download the upstream CSV if stale and rebuild the record table.
    Etl,

    /// Write a seeded random subset of the record table.
    Sample,

    /// Resolve institution strings against ROR.
    Institutions,

    /// Resolve DOIs against CrossRef.
    Dois,

    /// Merge resolved tables into the enriched output.
    Merge,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    let config = PipelineConfig::load().context("failed to load retractscope.toml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let pipeline = Pipeline::from_config(&config)?;
    let command = cli.command.unwrap_or(Commands::Run);
    let report = runtime.block_on(run(&pipeline, command))?;
    let dur = start.elapsed().as_millis();
    info!("{command:?} finished in {dur} ms");

    if cli.json {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": report,
            "meta": { "duration_ms": dur }
        }))?;
    } else {
        println!("{} ({dur} ms)", summary(&report));
    }
    Ok(())
}

async fn run(pipeline: &Pipeline, command: Commands) -> Result<PipelineReport> {
    let mut report = PipelineReport::default();
    match command {
        Commands::Run => {
            report = pipeline.run_all().await?;
        }
        Commands::Etl => {
            let mut checkpoints = CheckpointStore::load(&pipeline.config().checkpoint_path());
            report.refresh = Some(pipeline.refresh_source(&mut checkpoints).await?);
            report.etl = Some(pipeline.run_etl()?);
        }
        Commands::Sample => {
            report.sample = Some(pipeline.sample()?);
        }
        Commands::Institutions => {
            report.institutions = Some(pipeline.resolve_institutions().await?);
        }
        Commands::Dois => {
            report.dois = Some(pipeline.resolve_dois().await?);
        }
        Commands::Merge => {
            report.merge = Some(pipeline.merge()?);
        }
    }
    Ok(report)
}

fn summary(report: &PipelineReport) -> String {
    let mut parts = Vec::new();
    if let Some(etl) = &report.etl {
        parts.push(format!(
            "etl: {} records ({} dropped without DOI)",
            etl.records, etl.dropped_without_doi
        ));
    }
    if let Some(sample) = &report.sample {
        parts.push(format!(
            "sample: {} of {} records (seed {})",
            sample.sampled, sample.available, sample.seed
        ));
    }
    for (name, resolve) in [("ror", &report.institutions), ("crossref", &report.dois)] {
        if let Some(r) = resolve {
            parts.push(format!(
                "{name}: {} resolved, {} not found, {} failed, {} cached",
                r.resolved, r.not_found, r.failed, r.skipped
            ));
        }
    }
    if let Some(merge) = &report.merge {
        parts.push(format!(
            "merge: {} written, {} dropped",
            merge.written, merge.dropped
        ));
    }
    if parts.is_empty() {
        return "nothing to do".to_string();
    }
    parts.join("; ")
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string(val)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retractscope_enrich::{MergeReport, ResolveReport};

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["retractscope"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);

        let cli = Cli::try_parse_from(["retractscope", "merge", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Merge)));
        assert!(cli.json);

        let cli = Cli::try_parse_from(["retractscope", "sample"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Sample)));
    }

    #[test]
    fn test_summary_lists_completed_stages() {
        let report = PipelineReport {
            institutions: Some(ResolveReport {
                total: 4,
                skipped: 1,
                resolved: 2,
                not_found: 1,
                failed: 0,
                checkpoints: 1,
            }),
            merge: Some(MergeReport {
                written: 10,
                dropped: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            summary(&report),
            "ror: 2 resolved, 1 not found, 0 failed, 1 cached; merge: 10 written, 2 dropped"
        );
        assert_eq!(summary(&PipelineReport::default()), "nothing to do");
    }
}
