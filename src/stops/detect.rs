//! Dwell episode detection with a fixed-anchor distance check.

use crate::error::{
    validate_distance_threshold, validate_duration_threshold, validate_samples, Result,
};
use crate::geo_utils::{mean_position, sample_distance};
use crate::LocationSample;

use super::StopEpisode;

/// Runs shorter than this are never episodes, whatever their duration.
pub const MIN_EPISODE_SAMPLES: usize = 3;

/// Segment a chronologically sorted, deduplicated track into dwell episodes.
///
/// Each run starts at a sample (its anchor). Later samples join the run while
/// they are within `distance_threshold_m` of the anchor, not of the previous
/// sample, so slow drift eventually breaks the run. When a sample falls
/// outside, the run is emitted if it has at least [`MIN_EPISODE_SAMPLES`]
/// samples and spans at least `min_duration_ms`, and the outlier anchors the
/// next run. A trailing run is flushed the same way.
///
/// Fewer than three samples yields no episodes. Durations saturate at
/// `i64::MAX` for runs spanning extreme timestamps.
pub fn detect_episodes(
    samples: &[LocationSample],
    distance_threshold_m: f64,
    min_duration_ms: i64,
) -> Result<Vec<StopEpisode>> {
    validate_distance_threshold("distance_threshold_m", distance_threshold_m)?;
    validate_duration_threshold("min_duration_ms", min_duration_ms)?;
    validate_samples(samples)?;

    let mut episodes = Vec::new();
    if samples.len() < MIN_EPISODE_SAMPLES {
        return Ok(episodes);
    }

    let mut run_start = 0;
    for (i, sample) in samples.iter().enumerate().skip(1) {
        if sample_distance(&samples[run_start], sample) <= distance_threshold_m {
            continue;
        }
        if let Some(episode) = qualify_run(&samples[run_start..i], min_duration_ms) {
            episodes.push(episode);
        }
        run_start = i;
    }
    if let Some(episode) = qualify_run(&samples[run_start..], min_duration_ms) {
        episodes.push(episode);
    }

    Ok(episodes)
}

fn qualify_run(run: &[LocationSample], min_duration_ms: i64) -> Option<StopEpisode> {
    if run.len() < MIN_EPISODE_SAMPLES {
        return None;
    }

    let first = run.first()?;
    let last = run.last()?;
    let duration_ms = last.timestamp.saturating_sub(first.timestamp);
    if duration_ms < min_duration_ms {
        return None;
    }

    let (latitude, longitude) = mean_position(run)?;
    Some(StopEpisode {
        user_id: first.user_id.clone(),
        latitude,
        longitude,
        duration_ms,
        start_timestamp: first.timestamp,
        end_timestamp: last.timestamp,
        sample_count: run.len() as u32,
    })
}
