//! # Statistics Aggregator
//!
//! Per-user mobility statistics and their combination across users.
//!
//! [`compute_statistics`] runs the whole pipeline for one user's samples:
//! tally region visits over the raw samples, then deduplicate, sort, sum
//! travelled distance, bucket samples by local hour, and detect and cluster
//! stops. [`combine_statistics`]
//! merges several users' results into one all-users view, re-clustering their
//! stops with a second proximity pass.
//!
//! Per-user computations are independent. [`compute_all_statistics`] fans them
//! out with rayon when the `parallel` feature is enabled.
//!
//! ```rust
//! use location_analytics::{combine_statistics, compute_statistics, LocationSample};
//!
//! let hour = 3_600_000;
//! let a = compute_statistics("u1", &[
//!     LocationSample::new("u1", 32.0, 34.8, 0),
//!     LocationSample::new("u1", 32.0, 34.9, hour),
//! ]).unwrap();
//! let b = compute_statistics("u2", &[LocationSample::new("u2", 31.0, 35.0, 2 * hour)]).unwrap();
//!
//! let all = combine_statistics(&[a, b]).unwrap();
//! assert_eq!(all.total_locations, 3);
//! assert_eq!(all.active_hours(), 3);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::dedup::{deduplicate, sort_chronologically};
use crate::error::{validate_distance_threshold, validate_samples, AnalyticsError, Result};
use crate::geo_utils::path_length;
use crate::regions::Gazetteer;
use crate::stops::{cluster_episodes, combine_clusters, detect_episodes, StopCluster, StopConfig};
use crate::LocationSample;

/// Owner marker for statistics and clusters that span several users.
pub const COMBINED_USER_ID: &str = "all_users";

const HOURS_PER_DAY: usize = 24;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Configuration for statistics computation and combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Stop detection and per-user clustering thresholds
    pub stops: StopConfig,

    /// Merge radius for the cross-user stop pass.
    /// Default: 200.0 meters
    pub combine_cluster_threshold_m: f64,

    /// Maximum stops kept in a combined view.
    /// Default: 20
    pub max_combined_stops: u32,

    /// Offset from UTC used to derive the local hour of each sample.
    /// Default: 0 (UTC)
    pub utc_offset_minutes: i32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            stops: StopConfig::default(),
            combine_cluster_threshold_m: 200.0,
            max_combined_stops: 20,
            utc_offset_minutes: 0,
        }
    }
}

impl StatisticsConfig {
    /// Default thresholds with a local-time offset.
    pub fn with_utc_offset_minutes(utc_offset_minutes: i32) -> Self {
        Self {
            utc_offset_minutes,
            ..Self::default()
        }
    }

    /// Reject invalid thresholds and offsets of a day or more.
    pub fn validate(&self) -> Result<()> {
        self.stops.validate()?;
        validate_distance_threshold(
            "combine_cluster_threshold_m",
            self.combine_cluster_threshold_m,
        )?;
        self.offset().map(|_| ())
    }

    fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(AnalyticsError::InvalidThreshold {
                name: "utc_offset_minutes",
                value: self.utc_offset_minutes as f64,
            })
    }
}

/// Aggregate statistics for one user or a combined group of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub user_id: String,
    /// Samples left after deduplication
    pub total_locations: u64,
    /// Sum of distances between consecutive samples
    pub total_distance_meters: f64,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    /// Sample count per local hour of day, index 0..=23
    pub activity_hours: [u64; HOURS_PER_DAY],
    /// Raw sample count per region name, duplicates included
    pub region_visits: BTreeMap<String, u64>,
    /// Stop clusters, most visited first
    pub stops: Vec<StopCluster>,
}

impl UserStatistics {
    /// Zeroed statistics with no timestamps.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_locations: 0,
            total_distance_meters: 0.0,
            first_timestamp: None,
            last_timestamp: None,
            activity_hours: [0; HOURS_PER_DAY],
            region_visits: BTreeMap::new(),
            stops: Vec::new(),
        }
    }

    /// Number of hours of the day with at least one sample.
    pub fn active_hours(&self) -> usize {
        self.activity_hours.iter().filter(|&&count| count > 0).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Statistics for one user's samples with the default configuration and
/// gazetteer.
///
/// Empty input yields [`UserStatistics::empty`]. Samples with invalid
/// coordinates are rejected.
pub fn compute_statistics(user_id: &str, samples: &[LocationSample]) -> Result<UserStatistics> {
    compute_statistics_with_config(
        user_id,
        samples,
        &StatisticsConfig::default(),
        Gazetteer::default_ref(),
    )
}

/// Statistics for one user's samples.
pub fn compute_statistics_with_config(
    user_id: &str,
    samples: &[LocationSample],
    config: &StatisticsConfig,
    gazetteer: &Gazetteer,
) -> Result<UserStatistics> {
    config.validate()?;
    validate_samples(samples)?;

    if samples.is_empty() {
        return Ok(UserStatistics::empty(user_id));
    }

    let offset = config.offset()?;

    // Regions tally every raw sample, retransmitted copies included
    let mut region_visits: BTreeMap<String, u64> = BTreeMap::new();
    for sample in samples {
        *region_visits
            .entry(gazetteer.classify(sample.latitude, sample.longitude).to_string())
            .or_insert(0) += 1;
    }

    let mut unique = deduplicate(samples);
    sort_chronologically(&mut unique);

    let mut activity_hours = [0u64; HOURS_PER_DAY];
    for sample in &unique {
        activity_hours[local_hour(sample.timestamp, &offset)] += 1;
    }

    let stop_config = &config.stops;
    let episodes = detect_episodes(
        &unique,
        stop_config.distance_threshold_m,
        stop_config.min_duration_ms,
    )?;
    let stops = cluster_episodes(
        &episodes,
        stop_config.cluster_threshold_m,
        stop_config.max_stops,
        gazetteer,
    )?;

    let stats = UserStatistics {
        user_id: user_id.to_string(),
        total_locations: unique.len() as u64,
        total_distance_meters: path_length(&unique),
        first_timestamp: unique.first().map(|s| s.timestamp),
        last_timestamp: unique.last().map(|s| s.timestamp),
        activity_hours,
        region_visits,
        stops,
    };

    debug!(
        "[Statistics] {}: {} samples ({} unique), {:.0}m, {} stops, {} regions",
        user_id,
        samples.len(),
        stats.total_locations,
        stats.total_distance_meters,
        stats.stops.len(),
        stats.region_visits.len()
    );

    Ok(stats)
}

/// Combine several users' statistics with the default configuration.
pub fn combine_statistics(stats: &[UserStatistics]) -> Result<UserStatistics> {
    combine_statistics_with_config(stats, &StatisticsConfig::default())
}

/// Combine several users' statistics into one view owned by
/// [`COMBINED_USER_ID`].
///
/// Counts and distances are summed, timestamps take the overall min/max of
/// the set values, hour buckets and region counts add up key-wise, and stops
/// are concatenated and re-clustered with
/// `config.combine_cluster_threshold_m`.
pub fn combine_statistics_with_config(
    stats: &[UserStatistics],
    config: &StatisticsConfig,
) -> Result<UserStatistics> {
    config.validate()?;

    let mut combined = UserStatistics::empty(COMBINED_USER_ID);
    let mut all_stops: Vec<StopCluster> = Vec::new();

    for user in stats {
        combined.total_locations += user.total_locations;
        combined.total_distance_meters += user.total_distance_meters;
        combined.first_timestamp = min_set(combined.first_timestamp, user.first_timestamp);
        combined.last_timestamp = max_set(combined.last_timestamp, user.last_timestamp);

        for (bucket, count) in combined.activity_hours.iter_mut().zip(&user.activity_hours) {
            *bucket += count;
        }
        for (region, count) in &user.region_visits {
            *combined.region_visits.entry(region.clone()).or_insert(0) += count;
        }
        all_stops.extend(user.stops.iter().cloned());
    }

    combined.stops = combine_clusters(
        &all_stops,
        config.combine_cluster_threshold_m,
        config.max_combined_stops,
    )?;

    debug!(
        "[Statistics] Combined {} users: {} samples, {} stops",
        stats.len(),
        combined.total_locations,
        combined.stops.len()
    );

    Ok(combined)
}

/// Compute statistics for many users, in input order.
///
/// Runs on the rayon pool with the `parallel` feature. Fails on the first
/// user whose samples are invalid.
pub fn compute_all_statistics(
    per_user: &[(String, Vec<LocationSample>)],
    config: &StatisticsConfig,
    gazetteer: &Gazetteer,
) -> Result<Vec<UserStatistics>> {
    #[cfg(feature = "parallel")]
    let iter = per_user.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = per_user.iter();

    iter.map(|(user_id, samples)| {
        compute_statistics_with_config(user_id, samples, config, gazetteer)
    })
    .collect()
}

/// Split a mixed batch into per-user sample lists, ordered by user id.
pub fn group_by_user(samples: &[LocationSample]) -> Vec<(String, Vec<LocationSample>)> {
    let mut groups: BTreeMap<String, Vec<LocationSample>> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(sample.user_id.clone())
            .or_default()
            .push(sample.clone());
    }
    groups.into_iter().collect()
}

/// Local hour of day (0..=23) of an epoch-millisecond timestamp.
fn local_hour(timestamp_ms: i64, offset: &FixedOffset) -> usize {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc.with_timezone(offset).hour() as usize,
        // Beyond chrono's calendar range; plain modular arithmetic agrees
        // with chrono everywhere inside it
        None => {
            let local_ms = timestamp_ms.saturating_add(offset.local_minus_utc() as i64 * 1000);
            (local_ms.rem_euclid(MS_PER_DAY) / MS_PER_HOUR) as usize
        }
    }
}

fn min_set(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn max_set(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;

    fn sample(user: &str, lat: f64, lon: f64, ts: i64) -> LocationSample {
        LocationSample::new(user, lat, lon, ts)
    }

    fn dwell(user: &str, lat: f64, lon: f64, start: i64, count: i64) -> Vec<LocationSample> {
        (0..count)
            .map(|i| sample(user, lat, lon, start + i * 2 * MINUTE))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let stats = compute_statistics("u1", &[]).unwrap();
        assert_eq!(stats, UserStatistics::empty("u1"));
        assert_eq!(stats.total_locations, 0);
        assert_eq!(stats.total_distance_meters, 0.0);
        assert_eq!(stats.activity_hours, [0; 24]);
        assert!(stats.first_timestamp.is_none());
        assert!(stats.last_timestamp.is_none());
        assert!(stats.stops.is_empty());
        assert!(stats.region_visits.is_empty());
    }

    #[test]
    fn test_single_sample() {
        let stats = compute_statistics("u1", &[sample("u1", 32.7940, 34.9896, 5 * HOUR)]).unwrap();
        assert_eq!(stats.total_locations, 1);
        assert_eq!(stats.total_distance_meters, 0.0);
        assert_eq!(stats.first_timestamp, Some(5 * HOUR));
        assert_eq!(stats.last_timestamp, Some(5 * HOUR));
        assert_eq!(stats.activity_hours[5], 1);
        assert_eq!(stats.region_visits.get("Haifa"), Some(&1));
        assert!(stats.stops.is_empty());
    }

    #[test]
    fn test_duplicates_do_not_inflate() {
        let mut samples = dwell("u1", 31.7683, 35.2137, 0, 4);
        samples.push(sample("u1", 31.7700, 35.2150, 0));
        samples.push(sample("u1", 31.7700, 35.2150, 2 * MINUTE));

        let stats = compute_statistics("u1", &samples).unwrap();
        assert_eq!(stats.total_locations, 4);
        assert_eq!(stats.total_distance_meters, 0.0);
        assert_eq!(stats.activity_hours.iter().sum::<u64>(), 4);
        // Region tallies keep the retransmitted copies
        assert_eq!(stats.region_visits.values().sum::<u64>(), 6);
    }

    #[test]
    fn test_region_visits_count_raw_samples() {
        let samples = vec![
            sample("u1", 32.7940, 34.9896, 0),
            sample("u1", 32.7941, 34.9897, 0),
            sample("u1", 32.7940, 34.9896, MINUTE),
        ];
        let stats = compute_statistics("u1", &samples).unwrap();
        assert_eq!(stats.total_locations, 2);
        assert_eq!(stats.region_visits.get("Haifa"), Some(&3));
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let samples = vec![
            sample("u1", 32.02, 34.8, 2 * HOUR),
            sample("u1", 32.00, 34.8, 0),
            sample("u1", 32.01, 34.8, HOUR),
        ];
        let stats = compute_statistics("u1", &samples).unwrap();
        assert_eq!(stats.first_timestamp, Some(0));
        assert_eq!(stats.last_timestamp, Some(2 * HOUR));
        // Sorted path is 0.02 degrees of latitude, not 0.01 + 0.02
        assert!((stats.total_distance_meters - 2_224.0).abs() < 5.0);
    }

    #[test]
    fn test_local_hour_offset() {
        let config = StatisticsConfig::with_utc_offset_minutes(180);
        let stats = compute_statistics_with_config(
            "u1",
            &[sample("u1", 32.0, 34.8, 22 * HOUR)],
            &config,
            &Gazetteer::israel(),
        )
        .unwrap();
        assert_eq!(stats.activity_hours[1], 1);
        assert_eq!(stats.active_hours(), 1);
    }

    #[test]
    fn test_local_hour_before_epoch() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(local_hour(-1, &utc), 23);
        assert_eq!(local_hour(0, &utc), 0);
        assert_eq!(local_hour(i64::MAX, &utc), local_hour_arith(i64::MAX));
    }

    fn local_hour_arith(ts: i64) -> usize {
        (ts.rem_euclid(MS_PER_DAY) / MS_PER_HOUR) as usize
    }

    #[test]
    fn test_invalid_config() {
        let mut config = StatisticsConfig::default();
        config.utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());

        let mut config = StatisticsConfig::default();
        config.combine_cluster_threshold_m = -10.0;
        assert!(combine_statistics_with_config(&[], &config).is_err());
    }

    #[test]
    fn test_invalid_sample_rejected() {
        let samples = vec![sample("u1", 32.0, 34.8, 0), sample("u1", 95.0, 34.8, 1)];
        assert!(matches!(
            compute_statistics("u1", &samples),
            Err(AnalyticsError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_stops_and_regions() {
        let mut samples = dwell("u1", 32.7940, 34.9896, 0, 5);
        samples.extend(dwell("u1", 29.5577, 34.9519, 10 * HOUR, 5));
        samples.extend(dwell("u1", 32.7941, 34.9897, 20 * HOUR, 5));

        let stats = compute_statistics("u1", &samples).unwrap();
        assert_eq!(stats.stops.len(), 2);
        assert_eq!(stats.stops[0].name, "Haifa");
        assert_eq!(stats.stops[0].visit_count, 2);
        assert_eq!(stats.stops[1].name, "Eilat");
        assert_eq!(stats.region_visits.get("Haifa"), Some(&10));
        assert_eq!(stats.region_visits.get("Eilat"), Some(&5));
    }

    #[test]
    fn test_combine_empty_list() {
        let combined = combine_statistics(&[]).unwrap();
        assert_eq!(combined, UserStatistics::empty(COMBINED_USER_ID));
    }

    #[test]
    fn test_combine_sums_and_merges() {
        let a = compute_statistics("u1", &dwell("u1", 32.7940, 34.9896, 8 * HOUR, 5)).unwrap();
        let b = compute_statistics("u2", &dwell("u2", 32.7945, 34.9900, 3 * HOUR, 5)).unwrap();
        let empty = UserStatistics::empty("u3");

        let combined = combine_statistics(&[a.clone(), empty, b.clone()]).unwrap();
        assert_eq!(combined.user_id, COMBINED_USER_ID);
        assert_eq!(combined.total_locations, 10);
        assert_eq!(combined.first_timestamp, Some(3 * HOUR));
        assert_eq!(combined.last_timestamp, Some(8 * HOUR + 8 * MINUTE));
        assert_eq!(combined.activity_hours[8], 5);
        assert_eq!(combined.activity_hours[3], 5);
        assert_eq!(combined.region_visits.get("Haifa"), Some(&10));

        assert_eq!(combined.stops.len(), 1);
        assert_eq!(combined.stops[0].visit_count, 2);
        assert_eq!(combined.stops[0].user_id, COMBINED_USER_ID);
        assert_eq!(combined.stops[0].latitude, a.stops[0].latitude);
    }

    #[test]
    fn test_compute_all_preserves_order() {
        let per_user = vec![
            ("b".to_string(), dwell("b", 31.0, 35.0, 0, 3)),
            ("a".to_string(), vec![]),
            ("c".to_string(), dwell("c", 30.0, 35.0, 0, 1)),
        ];
        let all =
            compute_all_statistics(&per_user, &StatisticsConfig::default(), &Gazetteer::israel())
                .unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(all[0].total_locations, 3);
        assert_eq!(all[1].total_locations, 0);
    }

    #[test]
    fn test_group_by_user() {
        let samples = vec![
            sample("b", 0.0, 0.0, 1),
            sample("a", 0.0, 0.0, 2),
            sample("b", 0.0, 0.0, 3),
        ];
        let groups = group_by_user(&samples);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_json_output() {
        let stats = compute_statistics("u1", &dwell("u1", 32.7940, 34.9896, 0, 5)).unwrap();
        let json = stats.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["activity_hours"].as_array().unwrap().len(), 24);
        assert_eq!(value["stops"][0]["name"], "Haifa");
    }
}
