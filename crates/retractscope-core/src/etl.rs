//! Normalisation of the raw Retraction Watch CSV into [`Record`]s.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, RetractscopeError};
use crate::models::Record;

/// One raw CSV row keyed by normalised header name. Empty cells are absent.
pub type RawRow = BTreeMap<String, String>;

/// Values that stand in for a missing DOI in the upstream data.
const DOI_PLACEHOLDERS: &[&str] = &["unavailable", "0", "n/a", "na"];

/// A manual cell override keyed by original-paper DOI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub doi: String,
    pub field: String,
    /// `None` clears the cell.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EtlReport {
    pub rows_read: usize,
    pub dois_from_retraction: usize,
    pub corrections_applied: usize,
    pub dropped_without_doi: usize,
    pub records: usize,
}

/// `"Original Paper DOI "` → `"original_paper_doi"`.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

pub(crate) fn is_doi_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || DOI_PLACEHOLDERS
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

/// Read the raw CSV. Invalid UTF-8 is replaced rather than rejected.
pub fn read_raw_rows(path: &Path) -> Result<Vec<RawRow>> {
    if !path.exists() {
        return Err(RetractscopeError::InputMissing(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader
        .byte_headers()?
        .iter()
        .map(|h| normalize_header(&String::from_utf8_lossy(h)))
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .filter_map(|(header, value)| {
                let value = String::from_utf8_lossy(value).trim().to_string();
                (!value.is_empty()).then(|| (header.clone(), value))
            })
            .collect::<RawRow>();
        rows.push(row);
    }
    Ok(rows)
}

/// Load manual corrections (`originalpaperdoi,field,value`); a missing file means none.
///
/// A row with an empty `value` clears the cell.
pub fn load_corrections(path: &Path) -> Result<Vec<Correction>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let rows = read_raw_rows(path)?;
    Ok(rows
        .into_iter()
        .filter_map(|mut row| {
            Some(Correction {
                doi: row.remove("originalpaperdoi")?,
                field: normalize_header(&row.remove("field")?),
                value: row.remove("value"),
            })
        })
        .collect())
}

fn split_multi(value: Option<&String>) -> Vec<String> {
    value
        .map(|raw| {
            raw.split(';')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn record_from_row(row: &RawRow) -> Record {
    let text = |key: &str| row.get(key).cloned();
    Record {
        original_paper_doi: text("originalpaperdoi"),
        retraction_doi: text("retractiondoi"),
        original_paper_date: text("originalpaperdate"),
        retraction_date: text("retractiondate"),
        retraction_nature: text("retractionnature"),
        notes: text("notes"),
        institutions: split_multi(row.get("institution")),
        urls: split_multi(row.get("urls")),
        article_types: split_multi(row.get("articletype")),
        reasons: split_multi(row.get("reason")),
        ..Default::default()
    }
}

/// Apply DOI fallback and corrections, split multi-valued columns, and drop
/// rows that end up without an original-paper DOI.
pub fn normalize(rows: Vec<RawRow>, corrections: &[Correction]) -> (Vec<Record>, EtlReport) {
    let mut report = EtlReport {
        rows_read: rows.len(),
        ..Default::default()
    };

    let mut records = Vec::with_capacity(rows.len());
    for mut row in rows {
        if row
            .get("originalpaperdoi")
            .is_none_or(|doi| is_doi_placeholder(doi))
        {
            row.remove("originalpaperdoi");
            if let Some(retraction_doi) = row
                .get("retractiondoi")
                .filter(|doi| !is_doi_placeholder(doi))
                .cloned()
            {
                row.insert("originalpaperdoi".to_string(), retraction_doi);
                report.dois_from_retraction += 1;
            }
        }

        if let Some(doi) = row.get("originalpaperdoi").cloned() {
            for correction in corrections.iter().filter(|c| c.doi == doi) {
                match &correction.value {
                    Some(value) => row.insert(correction.field.clone(), value.clone()),
                    None => row.remove(&correction.field),
                };
                report.corrections_applied += 1;
            }
        }

        let record = record_from_row(&row);
        match record.doi() {
            Some(doi) if !is_doi_placeholder(doi) => records.push(record),
            _ => {
                debug!("dropping row without an original-paper DOI");
                report.dropped_without_doi += 1;
            }
        }
    }

    report.records = records.len();
    (records, report)
}

/// Full ETL over files on disk.
pub fn run_etl(raw_csv: &Path, corrections_csv: &Path) -> Result<(Vec<Record>, EtlReport)> {
    let rows = read_raw_rows(raw_csv)?;
    let corrections = load_corrections(corrections_csv)?;
    let (records, report) = normalize(rows, &corrections);
    info!(
        "ETL: {} rows read, {} records kept, {} dropped without DOI",
        report.rows_read, report.records, report.dropped_without_doi
    );
    Ok((records, report))
}
