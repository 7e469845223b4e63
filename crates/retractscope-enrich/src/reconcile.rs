//! Merging resolved registry rows back into records.
//!
//! Identity sets on a record only ever grow: a merge unions new values in and
//! never clears what an earlier run put there.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use retractscope_core::{OrganizationMatch, Record, WorkMetadata, WorkStatus};

use crate::resolved::ResolvedTable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub records: usize,
    /// Institution mentions with a row in the ROR table.
    pub matched_mentions: usize,
    pub unmatched_mentions: usize,
}

fn insert_present(set: &mut BTreeSet<String>, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        set.insert(value.to_string());
    }
}

/// Union the matches for each of `record`'s institutions into its ROR sets.
///
/// Returns `(matched, unmatched)` mention counts. Institutions with no row
/// leave the record unchanged.
pub fn reconcile_record(
    record: &mut Record,
    table: &ResolvedTable<OrganizationMatch>,
) -> (usize, usize) {
    let mut matched = 0;
    let mut unmatched = 0;

    for raw in &record.institutions {
        if raw.trim().is_empty() {
            continue;
        }
        let Some(org) = table.get(raw) else {
            unmatched += 1;
            continue;
        };
        matched += 1;

        insert_present(&mut record.ror_ids, Some(org.ror.as_str()));
        insert_present(&mut record.ror_names, Some(org.name.as_str()));
        insert_present(&mut record.ror_countries, org.country.as_deref());
        insert_present(&mut record.ror_regions, org.region.as_deref());
    }

    (matched, unmatched)
}

pub fn reconcile(
    records: &mut [Record],
    table: &ResolvedTable<OrganizationMatch>,
) -> ReconcileReport {
    let mut report = ReconcileReport {
        records: records.len(),
        ..Default::default()
    };
    for record in records.iter_mut() {
        let (matched, unmatched) = reconcile_record(record, table);
        report.matched_mentions += matched;
        report.unmatched_mentions += unmatched;
    }
    report
}

/// Identity of a record across runs: both DOIs plus its ordinal among
/// records sharing them.
type RecordKey<'a> = (Option<&'a str>, Option<&'a str>, usize);

fn record_keys(records: &[Record]) -> Vec<RecordKey<'_>> {
    let mut seen: HashMap<(Option<&str>, Option<&str>), usize> = HashMap::new();
    records
        .iter()
        .map(|r| {
            let dois = (r.doi(), r.retraction_doi.as_deref());
            let ordinal = seen.entry(dois).or_default();
            *ordinal += 1;
            (dois.0, dois.1, *ordinal - 1)
        })
        .collect()
}

/// Union identity sets from a previous output into the same records, so values
/// survive even when a record's institution list changed upstream.
///
/// Records are paired on original-paper DOI, retraction DOI and their order
/// among records sharing both; sets never move between distinct records.
/// Returns how many records picked up earlier values.
pub fn carry_forward(records: &mut [Record], previous: &[Record]) -> usize {
    let by_key: HashMap<RecordKey<'_>, &Record> = record_keys(previous)
        .into_iter()
        .zip(previous)
        .filter(|(key, old)| key.0.is_some() && old.has_ror_match())
        .collect();

    let keys: Vec<(Option<String>, Option<String>, usize)> = record_keys(records)
        .into_iter()
        .map(|(doi, retraction, n)| (doi.map(str::to_owned), retraction.map(str::to_owned), n))
        .collect();

    let mut carried = 0;
    for (record, (doi, retraction, n)) in records.iter_mut().zip(keys) {
        let Some(old) = by_key.get(&(doi.as_deref(), retraction.as_deref(), n)) else {
            continue;
        };
        record.ror_ids.extend(old.ror_ids.iter().cloned());
        record.ror_names.extend(old.ror_names.iter().cloned());
        record.ror_countries.extend(old.ror_countries.iter().cloned());
        record.ror_regions.extend(old.ror_regions.iter().cloned());
        carried += 1;
    }
    carried
}

/// Copy CrossRef fields onto records and drop records whose DOI CrossRef
/// reported as unknown. Records with no row at all are kept as they are.
///
/// Returns the kept records and the number dropped.
pub fn apply_work_metadata(
    records: Vec<Record>,
    table: &ResolvedTable<WorkMetadata>,
) -> (Vec<Record>, usize) {
    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .filter_map(|mut record| {
            let Some(work) = record.doi().and_then(|doi| table.get(doi)) else {
                return Some(record);
            };
            if work.status == WorkStatus::NotFound {
                return None;
            }

            record.work_type = work.work_type.clone().or(record.work_type.take());
            record.container = work.container.clone().or(record.container.take());
            record.publisher = work.publisher.clone().or(record.publisher.take());
            record.prefix = work.prefix.clone().or(record.prefix.take());
            Some(record)
        })
        .collect();

    let dropped = before - kept.len();
    (kept, dropped)
}
