//! # Stop Detection and Clustering
//!
//! Turns a user's chronologically sorted samples into named dwell locations.
//!
//! ## Pipeline
//!
//! 1. **Detect**: [`detect_episodes`] splits the track into runs anchored on
//!    each run's first sample. A run becomes a [`StopEpisode`] when it holds at
//!    least three samples and spans at least the minimum duration.
//! 2. **Cluster**: [`cluster_episodes`] merges episodes into [`StopCluster`]s
//!    by first-match proximity, keeping incremental visit counts and average
//!    durations, and names new clusters with the [`Gazetteer`].
//! 3. **Combine**: [`combine_clusters`] re-runs the proximity merge over
//!    clusters from several users for an all-users view.
//!
//! ## Approximation
//!
//! Cluster durations are running weighted means updated in O(1) per episode,
//! and a cluster's position stays at the mean of the episode that created it.
//! Neither is recomputed from the full episode history.

mod cluster;
mod detect;

pub use cluster::{cluster_episodes, combine_clusters};
pub use detect::{detect_episodes, MIN_EPISODE_SAMPLES};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dedup::{deduplicate, sort_chronologically};
use crate::error::{validate_distance_threshold, validate_duration_threshold, Result};
use crate::regions::Gazetteer;
use crate::LocationSample;

/// Thresholds for stop detection and per-user clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct StopConfig {
    /// Max distance from a run's first sample for later samples to join it.
    /// Default: 150.0 meters
    pub distance_threshold_m: f64,

    /// Minimum time span of a run to count as a stop.
    /// Default: 300_000 ms (5 minutes)
    pub min_duration_ms: i64,

    /// Maximum clusters returned, most visited first.
    /// Default: 20
    pub max_stops: u32,

    /// Radius for merging an episode into an existing cluster.
    /// Default: 800.0 meters
    pub cluster_threshold_m: f64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 150.0,
            min_duration_ms: 5 * 60 * 1000,
            max_stops: 20,
            cluster_threshold_m: 800.0,
        }
    }
}

impl StopConfig {
    /// Config with explicit detection thresholds and the default cluster radius.
    pub fn new(distance_threshold_m: f64, min_duration_ms: i64, max_stops: u32) -> Self {
        Self {
            distance_threshold_m,
            min_duration_ms,
            max_stops,
            ..Self::default()
        }
    }

    /// Override the cluster merge radius.
    pub fn with_cluster_threshold(mut self, cluster_threshold_m: f64) -> Self {
        self.cluster_threshold_m = cluster_threshold_m;
        self
    }

    /// Reject negative or non-finite thresholds.
    pub fn validate(&self) -> Result<()> {
        validate_distance_threshold("distance_threshold_m", self.distance_threshold_m)?;
        validate_duration_threshold("min_duration_ms", self.min_duration_ms)?;
        validate_distance_threshold("cluster_threshold_m", self.cluster_threshold_m)
    }
}

/// A maximal run of samples that stayed near its first sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct StopEpisode {
    pub user_id: String,
    /// Mean latitude of the run's samples
    pub latitude: f64,
    /// Mean longitude of the run's samples
    pub longitude: f64,
    /// Last timestamp minus first timestamp
    pub duration_ms: i64,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub sample_count: u32,
}

impl StopEpisode {
    pub fn duration_minutes(&self) -> f64 {
        self.duration_ms as f64 / 60_000.0
    }
}

/// A named dwell location aggregating one or more episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct StopCluster {
    pub latitude: f64,
    pub longitude: f64,
    /// Number of merged episodes, never below 1
    pub visit_count: u32,
    /// Running weighted mean of episode durations
    pub average_duration_minutes: f64,
    /// Region name resolved when the cluster was created
    pub name: String,
    /// Owner, or the combined-owner marker for merged cross-user clusters
    pub user_id: String,
}

impl StopCluster {
    /// Fold `visits` visits averaging `average_minutes` into this cluster.
    ///
    /// With `visits == 1` this is `(old_avg * (n - 1) + new) / n` where `n` is
    /// the updated visit count.
    pub(crate) fn absorb(&mut self, visits: u32, average_minutes: f64) {
        let previous = self.visit_count;
        self.visit_count += visits;
        self.average_duration_minutes = (self.average_duration_minutes * previous as f64
            + average_minutes * visits as f64)
            / self.visit_count as f64;
    }
}

/// Detect and cluster stops for one user's samples.
///
/// Samples are deduplicated and sorted first, so raw input is accepted.
/// Clusters are named with the default gazetteer.
///
/// # Example
/// ```
/// use location_analytics::{find_stops, LocationSample, StopConfig};
///
/// let minute = 60_000;
/// let samples: Vec<LocationSample> = (0..8)
///     .map(|i| LocationSample::new("u1", 32.7940, 34.9896, i * minute))
///     .collect();
///
/// let stops = find_stops(&samples, &StopConfig::default()).unwrap();
/// assert_eq!(stops.len(), 1);
/// assert_eq!(stops[0].visit_count, 1);
/// assert_eq!(stops[0].name, "Haifa");
/// ```
pub fn find_stops(samples: &[LocationSample], config: &StopConfig) -> Result<Vec<StopCluster>> {
    find_stops_with_gazetteer(samples, config, Gazetteer::default_ref())
}

/// [`find_stops`] with an explicit gazetteer for naming.
pub fn find_stops_with_gazetteer(
    samples: &[LocationSample],
    config: &StopConfig,
    gazetteer: &Gazetteer,
) -> Result<Vec<StopCluster>> {
    config.validate()?;

    let mut unique = deduplicate(samples);
    sort_chronologically(&mut unique);

    let episodes = detect_episodes(&unique, config.distance_threshold_m, config.min_duration_ms)?;
    let clusters = cluster_episodes(
        &episodes,
        config.cluster_threshold_m,
        config.max_stops,
        gazetteer,
    )?;

    debug!(
        "[Stops] {} samples ({} unique) -> {} episodes -> {} clusters",
        samples.len(),
        unique.len(),
        episodes.len(),
        clusters.len()
    );

    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;

    const MINUTE: i64 = 60_000;

    #[test]
    fn test_default_config() {
        let config = StopConfig::default();
        assert_eq!(config.distance_threshold_m, 150.0);
        assert_eq!(config.min_duration_ms, 300_000);
        assert_eq!(config.max_stops, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_negative_values() {
        assert!(StopConfig::new(-1.0, 0, 10).validate().is_err());
        assert!(StopConfig::new(100.0, -1, 10).validate().is_err());
        assert!(matches!(
            StopConfig::default().with_cluster_threshold(f64::NAN).validate(),
            Err(AnalyticsError::InvalidThreshold {
                name: "cluster_threshold_m",
                ..
            })
        ));
    }

    #[test]
    fn test_config_partial_json() {
        let config: StopConfig = serde_json::from_str(r#"{"max_stops": 5}"#).unwrap();
        assert_eq!(config.max_stops, 5);
        assert_eq!(config.distance_threshold_m, 150.0);
    }

    #[test]
    fn test_absorb_weighted_mean() {
        let mut cluster = StopCluster {
            latitude: 0.0,
            longitude: 0.0,
            visit_count: 1,
            average_duration_minutes: 10.0,
            name: "X".to_string(),
            user_id: "u".to_string(),
        };
        cluster.absorb(1, 20.0);
        assert_eq!(cluster.visit_count, 2);
        assert!((cluster.average_duration_minutes - 15.0).abs() < 1e-9);

        cluster.absorb(2, 30.0);
        assert_eq!(cluster.visit_count, 4);
        assert!((cluster.average_duration_minutes - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_find_stops_accepts_unsorted_duplicated_input() {
        let mut samples: Vec<LocationSample> = (0..6)
            .rev()
            .map(|i| LocationSample::new("u1", 31.7683, 35.2137, i * MINUTE))
            .collect();
        samples.push(LocationSample::new("u1", 31.7690, 35.2140, 0));

        let stops = find_stops(&samples, &StopConfig::default()).unwrap();
        assert_eq!(stops.len(), 1);
        assert!((stops[0].average_duration_minutes - 5.0).abs() < 1e-9);
        assert_eq!(stops[0].name, "Jerusalem");
    }

    #[test]
    fn test_find_stops_rejects_invalid_samples() {
        let samples = vec![
            LocationSample::new("u1", 31.0, 35.0, 0),
            LocationSample::new("u1", f64::NAN, 35.0, MINUTE),
            LocationSample::new("u1", 31.0, 35.0, 2 * MINUTE),
        ];
        assert!(matches!(
            find_stops(&samples, &StopConfig::default()),
            Err(AnalyticsError::InvalidCoordinates { .. })
        ));
    }
}
