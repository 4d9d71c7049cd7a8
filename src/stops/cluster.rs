//! Proximity merging of episodes into named stop clusters.
//!
//! Both passes use an ordered linear scan with early return: an item joins the
//! first existing cluster within the threshold, not the nearest one. This
//! keeps results independent of any index structure and reproducible across
//! implementations.

use log::debug;

use crate::error::{
    validate_coordinates, validate_distance_threshold, validate_duration_threshold,
    validate_non_negative, Result,
};
use crate::geo_utils::distance_meters;
use crate::regions::Gazetteer;
use crate::statistics::COMBINED_USER_ID;

use super::{StopCluster, StopEpisode};

/// Merge episodes, in emission order, into clusters.
///
/// A matching episode increments the cluster's `visit_count` and folds its
/// duration into the running mean. Cluster position is left at the creating
/// episode's mean. Unmatched episodes create a cluster named by `gazetteer`.
///
/// Output is sorted by `visit_count` descending (stable, so ties keep creation
/// order) and truncated to `max_stops`. An episode with an invalid position or
/// a negative duration rejects the whole call.
pub fn cluster_episodes(
    episodes: &[StopEpisode],
    cluster_threshold_m: f64,
    max_stops: u32,
    gazetteer: &Gazetteer,
) -> Result<Vec<StopCluster>> {
    validate_distance_threshold("cluster_threshold_m", cluster_threshold_m)?;
    episodes.iter().try_for_each(|episode| {
        validate_coordinates(&episode.user_id, episode.latitude, episode.longitude)?;
        validate_duration_threshold("duration_ms", episode.duration_ms)
    })?;

    let mut clusters: Vec<StopCluster> = Vec::new();

    for episode in episodes {
        let existing = clusters.iter_mut().find(|c| {
            distance_meters(c.latitude, c.longitude, episode.latitude, episode.longitude)
                <= cluster_threshold_m
        });

        match existing {
            Some(cluster) => cluster.absorb(1, episode.duration_minutes()),
            None => clusters.push(StopCluster {
                latitude: episode.latitude,
                longitude: episode.longitude,
                visit_count: 1,
                average_duration_minutes: episode.duration_minutes(),
                name: gazetteer
                    .classify(episode.latitude, episode.longitude)
                    .to_string(),
                user_id: episode.user_id.clone(),
            }),
        }
    }

    debug!(
        "[Clusters] {} episodes merged into {} clusters (threshold {:.0}m)",
        episodes.len(),
        clusters.len(),
        cluster_threshold_m
    );

    Ok(rank_and_truncate(clusters, max_stops))
}

/// Second clustering pass over already-clustered stops, typically the
/// concatenation of several users' stop lists.
///
/// Visit counts add up and average durations combine as visit-weighted means.
/// The first cluster of each merged group keeps its position and name. A
/// merged cluster whose members belong to different owners is re-owned by
/// [`COMBINED_USER_ID`]. Invalid positions or negative average durations are
/// rejected.
pub fn combine_clusters(
    clusters: &[StopCluster],
    cluster_threshold_m: f64,
    max_stops: u32,
) -> Result<Vec<StopCluster>> {
    validate_distance_threshold("cluster_threshold_m", cluster_threshold_m)?;
    clusters.iter().try_for_each(|stop| {
        validate_coordinates(&stop.user_id, stop.latitude, stop.longitude)?;
        validate_non_negative("average_duration_minutes", stop.average_duration_minutes)
    })?;

    let mut merged: Vec<StopCluster> = Vec::new();

    for stop in clusters {
        let existing = merged.iter_mut().find(|c| {
            distance_meters(c.latitude, c.longitude, stop.latitude, stop.longitude)
                <= cluster_threshold_m
        });

        match existing {
            Some(cluster) => {
                cluster.absorb(stop.visit_count, stop.average_duration_minutes);
                if cluster.user_id != stop.user_id {
                    cluster.user_id = COMBINED_USER_ID.to_string();
                }
            }
            None => merged.push(stop.clone()),
        }
    }

    debug!(
        "[Clusters] Combined {} clusters into {} (threshold {:.0}m)",
        clusters.len(),
        merged.len(),
        cluster_threshold_m
    );

    Ok(rank_and_truncate(merged, max_stops))
}

fn rank_and_truncate(mut clusters: Vec<StopCluster>, max_stops: u32) -> Vec<StopCluster> {
    clusters.sort_by(|a, b| b.visit_count.cmp(&a.visit_count));
    clusters.truncate(max_stops as usize);
    clusters
}
