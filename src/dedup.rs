//! Duplicate removal and chronological ordering of raw samples.
//!
//! The ingestion layer stores jittered copies of each ping and devices
//! retransmit batches, so the same `(user_id, timestamp)` can appear several
//! times. Duplicates would otherwise inflate stop durations and distance.

use std::collections::HashSet;

use crate::LocationSample;

/// Remove samples that repeat an earlier `(user_id, timestamp)` key.
///
/// The first occurrence wins and input order is preserved. The result is not
/// re-sorted.
///
/// # Example
/// ```
/// use location_analytics::{deduplicate, LocationSample};
///
/// let samples = vec![
///     LocationSample::new("u1", 32.0853, 34.7818, 1_000),
///     LocationSample::new("u1", 32.0856, 34.7821, 1_000), // jittered copy
///     LocationSample::new("u2", 31.7683, 35.2137, 1_000),
/// ];
/// let unique = deduplicate(&samples);
/// assert_eq!(unique.len(), 2);
/// assert_eq!(unique[0].latitude, 32.0853);
/// ```
pub fn deduplicate(samples: &[LocationSample]) -> Vec<LocationSample> {
    let mut seen: HashSet<(&str, i64)> = HashSet::with_capacity(samples.len());

    samples
        .iter()
        .filter(|s| seen.insert((s.user_id.as_str(), s.timestamp)))
        .cloned()
        .collect()
}

/// Sort samples ascending by timestamp.
///
/// The sort is stable, so samples sharing a timestamp keep their input order.
pub fn sort_chronologically(samples: &mut [LocationSample]) {
    samples.sort_by_key(|s| s.timestamp);
}
