//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the stateless
//! pipeline to Kotlin and Swift. Stateful calls live in
//! [`crate::engine::engine_ffi`]. Functions that return structured results as
//! JSON log failures and return `"{}"` instead of raising.

use crate::{
    classify_region, combine_statistics_with_config, compute_all_statistics,
    compute_statistics_with_config, distance_meters, find_stops, init_logging, Gazetteer,
    LocationSample, StatisticsConfig, StopCluster, StopConfig, UserStatistics,
};
use log::{error, info};

// ============================================================================
// Geometry and Regions
// ============================================================================

/// Great-circle distance in meters between two coordinates.
#[uniffi::export]
pub fn ffi_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_meters(lat1, lon1, lat2, lon2)
}

/// Region name for a coordinate using the built-in gazetteer.
#[uniffi::export]
pub fn ffi_classify_region(latitude: f64, longitude: f64) -> String {
    classify_region(latitude, longitude)
}

// ============================================================================
// Stops
// ============================================================================

/// Default stop detection configuration.
#[uniffi::export]
pub fn default_stop_config() -> StopConfig {
    StopConfig::default()
}

/// Detect and cluster stops for one user's samples. Returns an empty list on
/// invalid input.
#[uniffi::export]
pub fn ffi_find_stops(samples: Vec<LocationSample>, config: StopConfig) -> Vec<StopCluster> {
    init_logging();
    info!("[LocationAnalytics] find_stops: {} samples", samples.len());

    find_stops(&samples, &config).unwrap_or_else(|err| {
        error!("[LocationAnalytics] find_stops failed: {}", err);
        Vec::new()
    })
}

// ============================================================================
// Statistics
// ============================================================================

/// Parse an optional JSON config; empty input means defaults.
fn parse_config(config_json: &str) -> crate::Result<StatisticsConfig> {
    if config_json.trim().is_empty() {
        return Ok(StatisticsConfig::default());
    }
    Ok(serde_json::from_str(config_json)?)
}

fn stats_json(result: crate::Result<UserStatistics>, context: &str) -> String {
    result
        .and_then(|stats| stats.to_json())
        .unwrap_or_else(|err| {
            error!("[LocationAnalytics] {} failed: {}", context, err);
            "{}".to_string()
        })
}

/// Statistics for one user's samples as JSON.
///
/// `config_json` may be empty for defaults; missing fields take defaults.
#[uniffi::export]
pub fn ffi_compute_statistics_json(
    user_id: String,
    samples: Vec<LocationSample>,
    config_json: String,
) -> String {
    init_logging();
    info!(
        "[LocationAnalytics] compute_statistics for {} ({} samples)",
        user_id,
        samples.len()
    );

    let result = parse_config(&config_json).and_then(|config| {
        compute_statistics_with_config(&user_id, &samples, &config, Gazetteer::default_ref())
    });
    stats_json(result, "compute_statistics")
}

/// Combine a JSON array of per-user statistics into one all-users view.
#[uniffi::export]
pub fn ffi_combine_statistics_json(stats_json_array: String, config_json: String) -> String {
    init_logging();

    let result = parse_config(&config_json).and_then(|config| {
        let stats: Vec<UserStatistics> = serde_json::from_str(&stats_json_array)?;
        info!("[LocationAnalytics] combine_statistics for {} users", stats.len());
        combine_statistics_with_config(&stats, &config)
    });
    stats_json(result, "combine_statistics")
}

// ============================================================================
// Flat Buffer Processing (optimized for TypedArray input)
// ============================================================================

/// One user's track as flat buffers.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FlatUserTrack {
    pub user_id: String,
    /// Flat array of coordinates: [lat1, lng1, lat2, lng2, ...]
    pub coords: Vec<f64>,
    /// One timestamp (ms since epoch) per coordinate pair
    pub timestamps: Vec<i64>,
}

impl FlatUserTrack {
    fn samples(&self) -> Vec<LocationSample> {
        self.coords
            .chunks_exact(2)
            .zip(&self.timestamps)
            .map(|(pair, &ts)| LocationSample::new(self.user_id.as_str(), pair[0], pair[1], ts))
            .collect()
    }
}

/// Compute per-user statistics from flat buffers and combine them.
///
/// Returns `{"users": [...], "combined": {...}}`, or `"{}"` if any track is
/// invalid. Extra coordinates or timestamps past the shorter buffer are
/// ignored.
#[uniffi::export]
pub fn ffi_process_tracks_from_flat(tracks: Vec<FlatUserTrack>, config_json: String) -> String {
    init_logging();
    info!(
        "[LocationAnalytics] FLAT process_tracks called with {} tracks",
        tracks.len()
    );

    let start = std::time::Instant::now();
    let per_user: Vec<(String, Vec<LocationSample>)> = tracks
        .iter()
        .map(|track| (track.user_id.clone(), track.samples()))
        .collect();

    let result = parse_config(&config_json).and_then(|config| -> crate::Result<String> {
        let users = compute_all_statistics(&per_user, &config, Gazetteer::default_ref())?;
        let combined = combine_statistics_with_config(&users, &config)?;
        Ok(serde_json::json!({ "users": users, "combined": combined }).to_string())
    });

    match result {
        Ok(json) => {
            info!(
                "[LocationAnalytics] FLAT processed {} tracks in {:?}",
                tracks.len(),
                start.elapsed()
            );
            json
        }
        Err(err) => {
            error!("[LocationAnalytics] process_tracks failed: {}", err);
            "{}".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dwell_track(user: &str, lat: f64, lon: f64, count: usize) -> FlatUserTrack {
        FlatUserTrack {
            user_id: user.to_string(),
            coords: (0..count).flat_map(|_| [lat, lon]).collect(),
            timestamps: (0..count as i64).map(|i| i * 120_000).collect(),
        }
    }

    #[test]
    fn test_statistics_json() {
        let samples: Vec<LocationSample> = dwell_track("u1", 32.7940, 34.9896, 5).samples();
        let json = ffi_compute_statistics_json("u1".into(), samples, String::new());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_locations"], 5);
        assert_eq!(value["stops"][0]["name"], "Haifa");
    }

    #[test]
    fn test_invalid_input_returns_empty_object() {
        let bad = vec![LocationSample::new("u1", 120.0, 0.0, 0)];
        assert_eq!(ffi_compute_statistics_json("u1".into(), bad, String::new()), "{}");
        assert_eq!(ffi_combine_statistics_json("not json".into(), String::new()), "{}");
        assert_eq!(
            ffi_compute_statistics_json("u1".into(), vec![], "{".into()),
            "{}"
        );
    }

    #[test]
    fn test_combine_round_trip() {
        let a = ffi_compute_statistics_json(
            "u1".into(),
            dwell_track("u1", 32.7940, 34.9896, 5).samples(),
            String::new(),
        );
        let b = ffi_compute_statistics_json(
            "u2".into(),
            dwell_track("u2", 29.5577, 34.9519, 4).samples(),
            String::new(),
        );
        let json = ffi_combine_statistics_json(format!("[{},{}]", a, b), String::new());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["user_id"], "all_users");
        assert_eq!(value["total_locations"], 9);
    }

    #[test]
    fn test_flat_tracks() {
        let tracks = vec![
            dwell_track("u1", 32.7940, 34.9896, 5),
            dwell_track("u2", 31.7683, 35.2137, 3),
        ];
        let json = ffi_process_tracks_from_flat(tracks, String::new());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["users"].as_array().unwrap().len(), 2);
        assert_eq!(value["combined"]["total_locations"], 8);
    }

    #[test]
    fn test_find_stops_and_regions() {
        let stops = ffi_find_stops(
            dwell_track("u1", 31.7683, 35.2137, 4).samples(),
            default_stop_config(),
        );
        assert_eq!(stops.len(), 1);
        assert_eq!(ffi_classify_region(31.7683, 35.2137), "Jerusalem");
        assert_eq!(ffi_distance_meters(32.0, 34.8, 32.0, 34.8), 0.0);
    }
}
