//! # Geographic Utilities
//!
//! Distance and position helpers shared by the stop detector, the clusterer,
//! the region classifier and the statistics aggregator.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_meters`] | Haversine distance between two coordinates |
//! | [`is_valid_coordinate`] | Finite, in-range WGS84 check |
//! | [`sample_distance`] | Haversine distance between two samples |
//! | [`path_length`] | Total length of a chronologically sorted track |
//! | [`mean_position`] | Arithmetic mean position of a group of samples |
//!
//! ## Haversine Formula
//!
//! Distances use the haversine formula on a sphere of radius 6,371,000 m.
//! The radius is fixed (rather than the IUGG mean radius used by `geo`) so
//! results are reproducible against other implementations of the pipeline.
//!
//! ```rust
//! use location_analytics::geo_utils::distance_meters;
//!
//! let tel_aviv_to_jerusalem = distance_meters(32.0853, 34.7818, 31.7683, 35.2137);
//! assert!((tel_aviv_to_jerusalem - 54_000.0).abs() < 2_000.0);
//! ```

use geo::{Centroid, MultiPoint, Point};

use crate::LocationSample;

/// Earth radius used by every distance computation, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in meters between two WGS84 coordinates.
///
/// Symmetric and zero for identical coordinates. A longitude difference of
/// exactly 360° (e.g. +180° vs -180°) is the same meridian and contributes
/// nothing. NaN inputs propagate to a NaN result.
#[inline]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();

    let mut d_lon = lon2 - lon1;
    if d_lon > 180.0 {
        d_lon -= 360.0;
    } else if d_lon < -180.0 {
        d_lon += 360.0;
    }
    let d_lambda = d_lon.to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Check that a coordinate pair is finite and within WGS84 ranges.
#[inline]
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Haversine distance between two samples.
#[inline]
pub fn sample_distance(a: &LocationSample, b: &LocationSample) -> f64 {
    distance_meters(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Sum of consecutive distances along a track.
///
/// Empty or single-sample tracks return 0.0.
pub fn path_length(samples: &[LocationSample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }

    samples
        .windows(2)
        .map(|w| sample_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Position Functions
// =============================================================================

/// Mean (latitude, longitude) of a group of samples.
///
/// Plain arithmetic averaging, which is adequate for dwell groups spanning a
/// few hundred meters. Returns `None` for empty input.
pub fn mean_position(samples: &[LocationSample]) -> Option<(f64, f64)> {
    let points: MultiPoint<f64> = samples
        .iter()
        .map(|s| Point::new(s.longitude, s.latitude))
        .collect();

    points.centroid().map(|c| (c.y(), c.x()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Distance, Haversine};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_distance_same_point() {
        assert_eq!(distance_meters(32.0853, 34.7818, 32.0853, 34.7818), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let ab = distance_meters(32.0853, 34.7818, 29.5577, 34.9519);
        let ba = distance_meters(29.5577, 34.9519, 32.0853, 34.7818);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_distance_matches_geo_haversine() {
        // geo uses a slightly larger mean radius, so allow 0.01%
        let ours = distance_meters(51.5074, -0.1278, 48.8566, 2.3522);
        let theirs = Haversine::distance(Point::new(-0.1278, 51.5074), Point::new(2.3522, 48.8566));
        assert!(approx_eq(ours, theirs, theirs * 1e-4));
        assert!(approx_eq(ours, 343_560.0, 5_000.0));
    }

    #[test]
    fn test_distance_antimeridian() {
        assert_eq!(distance_meters(10.0, 180.0, 10.0, -180.0), 0.0);
        let across = distance_meters(0.0, 179.9, 0.0, -179.9);
        assert!(approx_eq(across, 22_239.0, 50.0));
    }

    #[test]
    fn test_distance_nan_propagates() {
        assert!(distance_meters(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_path_length() {
        assert_eq!(path_length(&[]), 0.0);
        let single = [LocationSample::new("u", 32.0, 34.0, 0)];
        assert_eq!(path_length(&single), 0.0);

        let track = [
            LocationSample::new("u", 32.0, 34.0, 0),
            LocationSample::new("u", 32.01, 34.0, 1),
            LocationSample::new("u", 32.02, 34.0, 2),
        ];
        // 0.02 degrees of latitude is ~2224 m
        assert!(approx_eq(path_length(&track), 2_224.0, 5.0));
    }

    #[test]
    fn test_mean_position() {
        assert!(mean_position(&[]).is_none());
        let group = [
            LocationSample::new("u", 32.00, 34.70, 0),
            LocationSample::new("u", 32.02, 34.72, 1),
        ];
        let (lat, lon) = mean_position(&group).unwrap();
        assert!(approx_eq(lat, 32.01, 1e-9));
        assert!(approx_eq(lon, 34.71, 1e-9));
    }
}
