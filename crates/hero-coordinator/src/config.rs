//! Coordinator tunables.

use hero_core::{HeroError, HeroResult};
use serde::{Deserialize, Serialize};

/// Runtime configuration for a [`crate::Coordinator`].
///
/// Every field has a default so an empty `[coordinator]` table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Seconds without a heartbeat after which an agent is reported offline.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Trailing window, in seconds, for the recent-activity listing.
    #[serde(default = "default_activity_window")]
    pub activity_window_secs: u64,

    /// When set, a background task also sweeps stale agents at this interval.
    /// Status reads always sweep regardless.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,

    /// Let a heartbeat without an explicit status bring an offline agent back.
    #[serde(default)]
    pub revive_on_heartbeat: bool,
}

/// Longest accepted duration for any coordinator setting: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn default_heartbeat_timeout() -> u64 {
    300
}

fn default_activity_window() -> u64 {
    3600
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            activity_window_secs: default_activity_window(),
            sweep_interval_secs: None,
            revive_on_heartbeat: false,
        }
    }
}

impl CoordinatorConfig {
    /// Heartbeat timeout, capped at [`MAX_DURATION_SECS`].
    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        bounded_seconds(self.heartbeat_timeout_secs)
    }

    /// Recent-activity window, capped at [`MAX_DURATION_SECS`].
    pub fn activity_window(&self) -> chrono::Duration {
        bounded_seconds(self.activity_window_secs)
    }

    /// Background sweep period, if one is configured.
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        self.sweep_interval_secs
            .map(|secs| std::time::Duration::from_secs(secs.min(MAX_DURATION_SECS)))
    }

    /// Reject values that would make every agent stale, never sweep, or
    /// overflow timestamp arithmetic.
    pub fn validate(&self) -> HeroResult<()> {
        if self.heartbeat_timeout_secs == 0 {
            return Err(HeroError::Config(
                "heartbeat_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(HeroError::Config(
                "sweep_interval_secs must be greater than zero when set".to_string(),
            ));
        }
        let bounded = [
            ("heartbeat_timeout_secs", Some(self.heartbeat_timeout_secs)),
            ("activity_window_secs", Some(self.activity_window_secs)),
            ("sweep_interval_secs", self.sweep_interval_secs),
        ];
        for (field, value) in bounded {
            if value.is_some_and(|secs| secs > MAX_DURATION_SECS) {
                return Err(HeroError::Config(format!(
                    "{field} must not exceed {MAX_DURATION_SECS} seconds"
                )));
            }
        }
        Ok(())
    }
}

fn bounded_seconds(secs: u64) -> chrono::Duration {
    // MAX_DURATION_SECS is far below i64::MAX / 1000, so this never truncates.
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}
