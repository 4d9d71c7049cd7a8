//! # Analytics Engine
//!
//! In-memory store of raw samples per user, with statistics computed on
//! demand over a time window.
//!
//! ## Architecture
//!
//! The engine holds:
//! - Raw samples grouped by user, in arrival order (duplicates included, the
//!   pipeline removes them)
//! - Per-user metadata (first/last seen, sample count)
//! - Statistics configuration and the gazetteer used for naming
//!
//! Nothing is cached: every statistics call recomputes from the stored
//! samples. Mobile callers reach a shared instance through [`with_engine`] so
//! samples don't cross the FFI boundary twice.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{validate_samples, Result};
use crate::regions::Gazetteer;
use crate::statistics::{
    combine_statistics_with_config, compute_all_statistics, compute_statistics_with_config,
    group_by_user, StatisticsConfig, UserStatistics,
};
use crate::LocationSample;

// ============================================================================
// Core Types
// ============================================================================

/// Metadata kept for every user that has sent samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct UserSummary {
    pub user_id: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub total_locations: u64,
}

/// Outcome of one ingested batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct IngestSummary {
    pub accepted: u32,
    pub users: u32,
    pub new_users: u32,
}

/// Engine statistics for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct EngineStats {
    pub user_count: u32,
    pub sample_count: u64,
}

// ============================================================================
// Analytics Engine
// ============================================================================

/// Stateful sample store and statistics front end.
pub struct AnalyticsEngine {
    samples: HashMap<String, Vec<LocationSample>>,
    users: HashMap<String, UserSummary>,
    config: StatisticsConfig,
    gazetteer: Gazetteer,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsEngine {
    /// Create an engine with the default configuration and gazetteer.
    pub fn new() -> Self {
        Self {
            samples: HashMap::new(),
            users: HashMap::new(),
            config: StatisticsConfig::default(),
            gazetteer: Gazetteer::default(),
        }
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: StatisticsConfig, gazetteer: Gazetteer) -> Result<Self> {
        config.validate()?;
        gazetteer.validate()?;
        Ok(Self {
            config,
            gazetteer,
            ..Self::new()
        })
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Store a batch of samples that may span several users.
    ///
    /// The batch is all-or-nothing: one invalid coordinate rejects it.
    pub fn ingest_batch(&mut self, batch: &[LocationSample]) -> Result<IngestSummary> {
        if let Err(err) = validate_samples(batch) {
            warn!("[Engine] Rejected batch of {} samples: {}", batch.len(), err);
            return Err(err);
        }

        let groups = group_by_user(batch);
        let mut new_users = 0;

        for (user_id, user_samples) in &groups {
            let first = user_samples.iter().map(|s| s.timestamp).min();
            let last = user_samples.iter().map(|s| s.timestamp).max();
            let (Some(first), Some(last)) = (first, last) else {
                continue;
            };

            let summary = self.users.entry(user_id.clone()).or_insert_with(|| {
                new_users += 1;
                UserSummary {
                    user_id: user_id.clone(),
                    first_seen: first,
                    last_seen: last,
                    total_locations: 0,
                }
            });
            summary.first_seen = summary.first_seen.min(first);
            summary.last_seen = summary.last_seen.max(last);
            summary.total_locations += user_samples.len() as u64;

            self.samples
                .entry(user_id.clone())
                .or_default()
                .extend(user_samples.iter().cloned());
        }

        let result = IngestSummary {
            accepted: batch.len() as u32,
            users: groups.len() as u32,
            new_users,
        };
        info!(
            "[Engine] Ingested {} samples for {} users ({} new)",
            result.accepted, result.users, result.new_users
        );
        Ok(result)
    }

    /// Remove a user and all their samples.
    pub fn remove_user(&mut self, user_id: &str) -> bool {
        self.samples.remove(user_id);
        self.users.remove(user_id).is_some()
    }

    /// Drop all stored samples and users.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.users.clear();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All known users, ordered by id.
    pub fn users(&self) -> Vec<UserSummary> {
        let mut users: Vec<UserSummary> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// A user's samples with `start_ms <= timestamp <= end_ms`, oldest first.
    pub fn locations(&self, user_id: &str, start_ms: i64, end_ms: i64) -> Vec<LocationSample> {
        let mut window: Vec<LocationSample> = self
            .samples
            .get(user_id)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.timestamp >= start_ms && s.timestamp <= end_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        window.sort_by_key(|s| s.timestamp);
        window
    }

    /// Statistics for one user over a time window. Unknown users yield empty
    /// statistics.
    pub fn user_statistics(
        &self,
        user_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<UserStatistics> {
        let window = self.locations(user_id, start_ms, end_ms);
        compute_statistics_with_config(user_id, &window, &self.config, &self.gazetteer)
    }

    /// Every user's statistics over a time window, combined into one view.
    pub fn combined_statistics(&self, start_ms: i64, end_ms: i64) -> Result<UserStatistics> {
        let per_user: Vec<(String, Vec<LocationSample>)> = self
            .users()
            .into_iter()
            .map(|u| {
                let window = self.locations(&u.user_id, start_ms, end_ms);
                (u.user_id, window)
            })
            .collect();

        let all = compute_all_statistics(&per_user, &self.config, &self.gazetteer)?;
        let combined = combine_statistics_with_config(&all, &self.config)?;

        info!(
            "[Engine] Combined statistics for {} users: {} samples, {} stops",
            all.len(),
            combined.total_locations,
            combined.stops.len()
        );
        Ok(combined)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn config(&self) -> &StatisticsConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: StatisticsConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_gazetteer(&mut self, gazetteer: Gazetteer) -> Result<()> {
        gazetteer.validate()?;
        self.gazetteer = gazetteer;
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            user_count: self.users.len() as u32,
            sample_count: self.samples.values().map(|s| s.len() as u64).sum(),
        }
    }
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global engine instance.
///
/// Lets FFI calls share one store without passing samples back and forth.
pub static ENGINE: Lazy<Mutex<AnalyticsEngine>> = Lazy::new(|| Mutex::new(AnalyticsEngine::new()));

/// Run `f` with exclusive access to the global engine.
///
/// A panic in an earlier holder does not leave the engine unusable: the lock
/// is recovered and the stored state is used as-is.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut AnalyticsEngine) -> R,
{
    let mut engine = ENGINE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut engine)
}

// ============================================================================
// FFI Exports
// ============================================================================

#[cfg(feature = "ffi")]
pub mod engine_ffi {
    use super::*;
    use crate::error::AnalyticsError;
    use log::error;

    /// Initialize the engine (call once at app startup).
    #[uniffi::export]
    pub fn engine_init() {
        crate::init_logging();
        info!("[Engine] Initialized");
    }

    /// Clear all engine state.
    #[uniffi::export]
    pub fn engine_clear() {
        with_engine(|e| e.clear());
        info!("[Engine] Cleared");
    }

    /// Store a batch of samples. Returns `None` if the batch was rejected.
    #[uniffi::export]
    pub fn engine_ingest(samples: Vec<LocationSample>) -> Option<IngestSummary> {
        with_engine(|e| e.ingest_batch(&samples)).ok()
    }

    /// Remove a user and their samples.
    #[uniffi::export]
    pub fn engine_remove_user(user_id: String) -> bool {
        with_engine(|e| e.remove_user(&user_id))
    }

    /// All known users.
    #[uniffi::export]
    pub fn engine_get_users() -> Vec<UserSummary> {
        with_engine(|e| e.users())
    }

    /// Users as JSON: [{"user_id": "...", "first_seen": ..., "last_seen": ..., "total_locations": ...}, ...]
    #[uniffi::export]
    pub fn engine_get_users_json() -> String {
        with_engine(|e| serde_json::to_string(&e.users()).unwrap_or_else(|_| "[]".to_string()))
    }

    /// One user's statistics over a time window as JSON.
    #[uniffi::export]
    pub fn engine_get_statistics_json(user_id: String, start_ms: i64, end_ms: i64) -> String {
        with_engine(|e| {
            e.user_statistics(&user_id, start_ms, end_ms)
                .and_then(|stats| stats.to_json())
                .unwrap_or_else(|err| {
                    error!("[Engine] Statistics for {} failed: {}", user_id, err);
                    "{}".to_string()
                })
        })
    }

    /// All users' combined statistics over a time window as JSON.
    #[uniffi::export]
    pub fn engine_get_combined_statistics_json(start_ms: i64, end_ms: i64) -> String {
        with_engine(|e| {
            e.combined_statistics(start_ms, end_ms)
                .and_then(|stats| stats.to_json())
                .unwrap_or_else(|err| {
                    error!("[Engine] Combined statistics failed: {}", err);
                    "{}".to_string()
                })
        })
    }

    /// Replace the statistics configuration from JSON. Returns false on
    /// malformed or invalid config.
    #[uniffi::export]
    pub fn engine_set_config_json(config_json: String) -> bool {
        let applied = serde_json::from_str::<StatisticsConfig>(&config_json)
            .map_err(AnalyticsError::from)
            .and_then(|config| with_engine(|e| e.set_config(config)));
        if let Err(err) = &applied {
            error!("[Engine] Config rejected: {}", err);
        }
        applied.is_ok()
    }

    /// Replace the gazetteer from JSON. Returns false on malformed data.
    #[uniffi::export]
    pub fn engine_set_gazetteer_json(gazetteer_json: String) -> bool {
        let applied = Gazetteer::from_json(&gazetteer_json)
            .and_then(|gazetteer| with_engine(|e| e.set_gazetteer(gazetteer)));
        if let Err(err) = &applied {
            error!("[Engine] Gazetteer rejected: {}", err);
        }
        applied.is_ok()
    }

    /// Get engine statistics.
    #[uniffi::export]
    pub fn engine_get_stats() -> EngineStats {
        with_engine(|e| e.stats())
    }
}
