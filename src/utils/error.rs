//! Error types used by the throttling bus.
//!
//! - [`DeliveryError`]: a single handler failed while a payload was being
//!   delivered. These are logged and contained, never returned to callers.
//! - [`BusError`]: the bus could not be constructed.
//! - [`SettingsError`]: configuration could not be loaded or is invalid.

use config::ConfigError;
use thiserror::Error;

use crate::bus::SubscriptionId;

/// Boxed error a handler may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Failure of one handler during one delivery.
///
/// Produced inside a tick. The tick logs it and moves on to the next handler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The handler returned an error.
    #[error("handler {subscription} failed on topic '{topic}': {source}")]
    Failed {
        topic: String,
        subscription: SubscriptionId,
        #[source]
        source: BoxError,
    },

    /// The handler panicked; the panic was caught.
    #[error("handler {subscription} panicked on topic '{topic}': {message}")]
    Panicked {
        topic: String,
        subscription: SubscriptionId,
        message: String,
    },
}

impl DeliveryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Failed { .. } => "delivery_handler_failed",
            DeliveryError::Panicked { .. } => "delivery_handler_panicked",
        }
    }

    /// Topic the failed delivery belonged to.
    pub fn topic(&self) -> &str {
        match self {
            DeliveryError::Failed { topic, .. } | DeliveryError::Panicked { topic, .. } => topic,
        }
    }
}

/// # Errors raised when constructing a bus.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// Timers are driven by tokio; a bus needs a runtime to spawn them on.
    #[error("no tokio runtime available to drive topic timers")]
    NoRuntime,

    /// The runtime was built without `enable_time()`, so topic timers cannot sleep.
    #[error("tokio runtime has no time driver; build it with enable_time()")]
    NoTimeDriver,

    #[error("invalid bus settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

/// # Errors raised while loading or validating settings.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("throttle interval must be greater than zero")]
    ZeroInterval,

    #[error("max_queue_len must be greater than zero when set")]
    ZeroQueueBound,
}

impl SettingsError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SettingsError::Load(_) => "settings_load",
            SettingsError::ZeroInterval => "settings_zero_interval",
            SettingsError::ZeroQueueBound => "settings_zero_queue_bound",
        }
    }
}
