//! Seeded random subset of the record table.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::Serialize;
use tracing::info;

use crate::etl::is_doi_placeholder;
use crate::models::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleReport {
    /// Records with a usable original-paper DOI.
    pub available: usize,
    pub sampled: usize,
    pub seed: u64,
}

/// Pick `size` records with a usable DOI, reproducibly for a given `seed`.
///
/// Picked records keep their table order. When fewer than `size` are
/// available, all of them are returned.
pub fn sample_records(
    records: Vec<Record>,
    size: usize,
    seed: u64,
) -> (Vec<Record>, SampleReport) {
    let usable: Vec<Record> = records
        .into_iter()
        .filter(|r| r.doi().is_some_and(|doi| !is_doi_placeholder(doi)))
        .collect();
    let available = usable.len();

    let sampled = if available <= size {
        usable
    } else {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = index::sample(&mut rng, available, size).into_vec();
        picked.sort_unstable();

        let mut picked = picked.into_iter().peekable();
        usable
            .into_iter()
            .enumerate()
            .filter_map(|(i, record)| picked.next_if_eq(&i).map(|_| record))
            .collect()
    };

    info!("sampled {} of {available} records (seed {seed})", sampled.len());
    let report = SampleReport {
        available,
        sampled: sampled.len(),
        seed,
    };
    (sampled, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::new(format!("10.1/{i}"))).collect()
    }

    #[test]
    fn test_same_seed_same_sample() {
        let (first, report) = sample_records(records(100), 10, 1);
        let (second, _) = sample_records(records(100), 10, 1);
        let (other, _) = sample_records(records(100), 10, 2);

        assert_eq!(
            report,
            SampleReport {
                available: 100,
                sampled: 10,
                seed: 1,
            }
        );
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_sample_keeps_table_order() {
        let (sampled, _) = sample_records(records(50), 20, 7);
        let positions: Vec<usize> = sampled
            .iter()
            .filter_map(|r| r.doi()?.strip_prefix("10.1/")?.parse().ok())
            .collect();

        assert_eq!(positions.len(), 20);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_records_without_doi_are_never_sampled() {
        let mut input = records(3);
        input.push(Record::default());
        input.push(Record::new("Unavailable"));
        input.push(Record::new(""));

        let (sampled, report) = sample_records(input, 5000, 1);

        assert_eq!(report.available, 3);
        assert_eq!(sampled, records(3));
    }
}
