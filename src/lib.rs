//! # Location Analytics
//!
//! Per-user mobility analytics derived from raw GPS pings.
//!
//! This library provides:
//! - Duplicate removal for retransmitted or jitter-duplicated pings
//! - Dwell ("stop") detection over noisy, irregularly sampled tracks
//! - Proximity clustering of stops into named places, per user and across users
//! - Coarse region naming from a static, priority-ordered gazetteer
//! - Per-user statistics (distance, hourly activity, regions, stops) and
//!   combination of many users' statistics into one view
//!
//! ## Features
//!
//! - **`parallel`** - Fan out per-user statistics with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use location_analytics::{compute_statistics, LocationSample};
//!
//! let minute = 60_000;
//! let samples: Vec<LocationSample> = (0..10)
//!     .map(|i| LocationSample::new("u1", 31.7683, 35.2137, i * minute))
//!     .collect();
//!
//! let stats = compute_statistics("u1", &samples).unwrap();
//! assert_eq!(stats.total_locations, 10);
//! assert_eq!(stats.stops.len(), 1);
//! assert_eq!(stats.stops[0].name, "Jerusalem");
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{AnalyticsError, Result};

// Geographic utilities (haversine distance, track length, mean position)
pub mod geo_utils;
pub use geo_utils::distance_meters;

// Duplicate removal and chronological ordering
pub mod dedup;
pub use dedup::{deduplicate, sort_chronologically};

// Region naming from a static gazetteer
pub mod regions;
pub use regions::{
    classify_region, Gazetteer, LatitudeBand, LongitudeSplit, NamedRegion, RegionBands,
};

// Stop detection and clustering
pub mod stops;
pub use stops::{
    cluster_episodes, combine_clusters, detect_episodes, find_stops, StopCluster, StopConfig,
    StopEpisode,
};

// Per-user and combined statistics
pub mod statistics;
pub use statistics::{
    combine_statistics, combine_statistics_with_config, compute_all_statistics,
    compute_statistics, compute_statistics_with_config, StatisticsConfig, UserStatistics,
    COMBINED_USER_ID,
};

// Stateful in-memory sample store (singleton for FFI callers)
pub mod engine;
pub use engine::{with_engine, AnalyticsEngine, EngineStats, IngestSummary, UserSummary, ENGINE};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("LocationAnalyticsRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // Host applications install their own logger
}

// ============================================================================
// Core Types
// ============================================================================

/// One raw location reading.
///
/// Samples are read-only inside the pipeline. Timestamps are milliseconds
/// since the Unix epoch and need not be unique or ordered on input.
///
/// # Example
/// ```
/// use location_analytics::LocationSample;
/// let sample = LocationSample::new("u1", 32.0853, 34.7818, 1_700_000_000_000);
/// assert!(sample.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationSample {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since epoch
    pub timestamp: i64,
    /// Reported accuracy in meters. Advisory only; no threshold uses it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl LocationSample {
    /// Create a sample without an accuracy reading.
    pub fn new(user_id: impl Into<String>, latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            user_id: user_id.into(),
            latitude,
            longitude,
            timestamp,
            accuracy: None,
        }
    }

    /// Attach an accuracy reading in meters.
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Check if the sample has finite, in-range WGS84 coordinates.
    pub fn is_valid(&self) -> bool {
        geo_utils::is_valid_coordinate(self.latitude, self.longitude)
    }
}

// ============================================================================
// Tests
// ============================================================================
