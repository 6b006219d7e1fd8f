use std::time::Duration;

use serde::Deserialize;

use crate::utils::error::SettingsError;

/// Top-level configuration settings for the application.
///
/// Includes settings for the throttling bus and for logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bus: BusSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the throttling bus.
///
/// One interval applies to every topic. The queue bound is off by default,
/// in which case `overflow_policy` is never consulted.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BusSettings {
    pub throttle_interval_ms: u64,
    pub max_queue_len: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    /// Whether a publish into a topic whose timer went idle arms it again.
    pub rearm_on_publish: bool,
}

impl BusSettings {
    /// The throttle interval as a `Duration`.
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    /// Rejects values the bus cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.throttle_interval_ms == 0 {
            return Err(SettingsError::ZeroInterval);
        }
        if self.max_queue_len == Some(0) {
            return Err(SettingsError::ZeroQueueBound);
        }
        Ok(())
    }
}

/// What `publish` does when a bounded queue is full.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the queue as is and discard the payload being published.
    #[default]
    RejectNewest,
    /// Discard the oldest queued payload to make room.
    DropOldest,
}

/// Configuration settings for logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub bus: Option<PartialBusSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

/// Partial bus settings.
#[derive(Debug, Deserialize)]
pub struct PartialBusSettings {
    pub throttle_interval_ms: Option<u64>,
    pub max_queue_len: Option<usize>,
    pub overflow_policy: Option<OverflowPolicy>,
    pub rearm_on_publish: Option<bool>,
}

/// Partial logging settings.
#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            throttle_interval_ms: 1000,
            max_queue_len: None,
            overflow_policy: OverflowPolicy::RejectNewest,
            rearm_on_publish: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            bus: BusSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
