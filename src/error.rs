//! Unified error handling for the location-analytics library.
//!
//! Malformed input (non-finite coordinates, negative thresholds, broken
//! gazetteer data) is rejected at the boundary with a typed error. Degenerate
//! input such as an empty sample list is never an error.

use thiserror::Error;

use crate::geo_utils::is_valid_coordinate;
use crate::LocationSample;

/// Unified error type for location-analytics operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Sample has a non-finite or out-of-range coordinate
    #[error("sample for user '{user_id}' has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        user_id: String,
        latitude: f64,
        longitude: f64,
    },
    /// Threshold, duration or visit average is negative or not finite
    #[error("'{name}' must be finite and non-negative, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    /// Region configuration is malformed
    #[error("invalid gazetteer: {message}")]
    InvalidGazetteer { message: String },
    /// JSON encoding or decoding failed
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for location-analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Reject a sample whose coordinates are not finite WGS84 degrees.
pub fn validate_sample(sample: &LocationSample) -> Result<()> {
    validate_coordinates(&sample.user_id, sample.latitude, sample.longitude)
}

/// Reject a position (sample, episode or cluster) that is not finite WGS84
/// degrees.
pub fn validate_coordinates(user_id: &str, latitude: f64, longitude: f64) -> Result<()> {
    if is_valid_coordinate(latitude, longitude) {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidCoordinates {
            user_id: user_id.to_string(),
            latitude,
            longitude,
        })
    }
}

/// Validate every sample, failing on the first invalid one.
pub fn validate_samples(samples: &[LocationSample]) -> Result<()> {
    samples.iter().try_for_each(validate_sample)
}

/// Distance thresholds must be finite and non-negative.
pub fn validate_distance_threshold(name: &'static str, meters: f64) -> Result<()> {
    validate_non_negative(name, meters)
}

/// Reject a NaN, infinite or negative quantity.
pub fn validate_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidThreshold { name, value })
    }
}

/// Duration thresholds must be non-negative.
pub fn validate_duration_threshold(name: &'static str, millis: i64) -> Result<()> {
    if millis >= 0 {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidThreshold {
            name,
            value: millis as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyticsError::InvalidCoordinates {
            user_id: "u1".to_string(),
            latitude: f64::NAN,
            longitude: 34.78,
        };
        assert!(err.to_string().contains("u1"));
        assert!(err.to_string().contains("invalid coordinates"));
    }

    #[test]
    fn test_validate_sample() {
        let ok = LocationSample::new("u1", 32.0853, 34.7818, 0);
        assert!(validate_sample(&ok).is_ok());

        let bad = LocationSample::new("u1", f64::INFINITY, 34.7818, 0);
        assert!(matches!(
            validate_sample(&bad),
            Err(AnalyticsError::InvalidCoordinates { .. })
        ));

        let out_of_range = LocationSample::new("u1", 32.0, 181.0, 0);
        assert!(validate_sample(&out_of_range).is_err());
    }

    #[test]
    fn test_validate_thresholds() {
        assert!(validate_distance_threshold("d", 0.0).is_ok());
        assert!(validate_distance_threshold("d", -1.0).is_err());
        assert!(validate_distance_threshold("d", f64::NAN).is_err());
        assert!(validate_duration_threshold("t", 0).is_ok());
        assert!(matches!(
            validate_duration_threshold("t", -5),
            Err(AnalyticsError::InvalidThreshold { name: "t", .. })
        ));
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates("u1", -90.0, 180.0).is_ok());
        assert!(matches!(
            validate_coordinates("u1", f64::NAN, 34.0),
            Err(AnalyticsError::InvalidCoordinates { .. })
        ));
        assert!(validate_coordinates("u1", 32.0, f64::NEG_INFINITY).is_err());
        assert!(validate_non_negative("average_duration_minutes", 12.5).is_ok());
        assert!(validate_non_negative("average_duration_minutes", -0.5).is_err());
        assert!(validate_non_negative("average_duration_minutes", f64::NAN).is_err());
    }

    #[test]
    fn test_from_json_error() {
        let err: AnalyticsError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, AnalyticsError::Serialization { .. }));
    }
}
