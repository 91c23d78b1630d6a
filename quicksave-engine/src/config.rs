//! Engine configuration
//!
//! Every tuning constant the engine consults lives here with the production
//! default, so deployments can adjust autosave cadence, retention, and the
//! conflict window without touching call sites.

use crate::codec::BlobCodec;
use quicksave_core::{AutosaveError, AutosaveResult, ConfigError};
use serde::Serialize;
use std::time::Duration;

/// Recommended client debounce between autosave calls (3 seconds).
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 3;

/// Rolling count of non-milestone checkpoints kept per report.
pub const DEFAULT_MAX_CHECKPOINTS: usize = 50;

/// How long a checkpoint stays recoverable (7 days).
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

/// Trailing window in which another context's write counts as concurrent
/// activity (5 minutes).
pub const DEFAULT_CONFLICT_WINDOW_SECS: u64 = 300;

/// Bound a networked store implementation must honor per call.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

/// Configuration for the autosave engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AutosaveConfig {
    /// Recommended client debounce between autosaves
    /// (default: 3 seconds). Advisory; exposed to clients via the policy.
    pub autosave_interval: Duration,

    /// How many recent non-milestone checkpoints to keep per report
    /// (default: 50). Milestones and the single most recent checkpoint are
    /// kept on top of this.
    pub max_checkpoints: usize,

    /// Expiry horizon stamped on every checkpoint (default: 7 days).
    pub retention: Duration,

    /// Trailing window for conflict detection (default: 5 minutes).
    pub conflict_window: Duration,

    /// Whether identical consecutive saves collapse into one checkpoint
    /// (default: true).
    pub dedup_enabled: bool,

    /// How state bytes are encoded for storage (default: zlib level 6).
    pub codec: BlobCodec,

    /// Per-call bound for store operations (default: 5 seconds). A contract
    /// on store implementations; the in-memory backend never approaches it.
    pub store_timeout: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
            retention: Duration::from_secs(DEFAULT_RETENTION_DAYS * 24 * 60 * 60),
            conflict_window: Duration::from_secs(DEFAULT_CONFLICT_WINDOW_SECS),
            dedup_enabled: true,
            codec: BlobCodec::default(),
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
        }
    }
}

impl AutosaveConfig {
    /// Build from `QUICKSAVE_*` environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let codec = match std::env::var("QUICKSAVE_COMPRESSION")
            .ok()
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("none") => BlobCodec::None,
            Some("zlib") => {
                let level = std::env::var("QUICKSAVE_COMPRESSION_LEVEL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(6);
                BlobCodec::zlib_with_level(level)
            }
            _ => defaults.codec,
        };

        Self {
            autosave_interval: std::env::var("QUICKSAVE_AUTOSAVE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.autosave_interval),
            max_checkpoints: std::env::var("QUICKSAVE_MAX_CHECKPOINTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_checkpoints),
            retention: std::env::var("QUICKSAVE_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|days| Duration::from_secs(days * 24 * 60 * 60))
                .unwrap_or(defaults.retention),
            conflict_window: std::env::var("QUICKSAVE_CONFLICT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.conflict_window),
            dedup_enabled: std::env::var("QUICKSAVE_DEDUP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.dedup_enabled),
            codec,
            store_timeout: std::env::var("QUICKSAVE_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_timeout),
        }
    }

    pub fn validate(&self) -> AutosaveResult<()> {
        if self.autosave_interval.is_zero() {
            return Err(AutosaveError::Config(ConfigError::InvalidValue {
                field: "autosave_interval".to_string(),
                value: format!("{:?}", self.autosave_interval),
                reason: "autosave_interval must be positive".to_string(),
            }));
        }

        if self.max_checkpoints == 0 {
            return Err(AutosaveError::Config(ConfigError::InvalidValue {
                field: "max_checkpoints".to_string(),
                value: self.max_checkpoints.to_string(),
                reason: "max_checkpoints must be at least 1".to_string(),
            }));
        }

        if self.retention.is_zero() {
            return Err(AutosaveError::Config(ConfigError::InvalidValue {
                field: "retention".to_string(),
                value: format!("{:?}", self.retention),
                reason: "retention must be positive".to_string(),
            }));
        }

        if self.conflict_window.is_zero() {
            return Err(AutosaveError::Config(ConfigError::InvalidValue {
                field: "conflict_window".to_string(),
                value: format!("{:?}", self.conflict_window),
                reason: "conflict_window must be positive".to_string(),
            }));
        }

        if self.retention < self.conflict_window {
            return Err(AutosaveError::Config(ConfigError::InvalidValue {
                field: "retention".to_string(),
                value: format!("{:?}", self.retention),
                reason: "retention must not be shorter than the conflict window".to_string(),
            }));
        }

        if let BlobCodec::Zlib { level } = self.codec {
            if level > 9 {
                return Err(AutosaveError::Config(ConfigError::InvalidValue {
                    field: "codec".to_string(),
                    value: level.to_string(),
                    reason: "zlib level must be 0-9".to_string(),
                }));
            }
        }

        if self.store_timeout.is_zero() {
            return Err(AutosaveError::Config(ConfigError::InvalidValue {
                field: "store_timeout".to_string(),
                value: format!("{:?}", self.store_timeout),
                reason: "store_timeout must be positive".to_string(),
            }));
        }

        Ok(())
    }
}

/// Saturating conversion for timestamp arithmetic with configured durations.
pub(crate) fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}

/// The slice of configuration a client needs to cooperate with the engine:
/// how often to autosave and how stale a foreign write can be while still
/// counting as concurrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutosavePolicy {
    pub autosave_interval_secs: u64,
    pub conflict_window_secs: u64,
}

impl AutosavePolicy {
    pub fn from_config(config: &AutosaveConfig) -> Self {
        Self {
            autosave_interval_secs: config.autosave_interval.as_secs(),
            conflict_window_secs: config.conflict_window.as_secs(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
