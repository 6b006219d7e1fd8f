mod settings;

use config::{Config, Environment, File};

use crate::utils::error::SettingsError;
use settings::PartialSettings;

pub use settings::{BusSettings, LoggingSettings, OverflowPolicy, Settings};

/// Prefix for environment overrides, e.g. `THROTTLEBUS_BUS__THROTTLE_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "THROTTLEBUS";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values and validates the result
pub fn load_config() -> Result<Settings, SettingsError> {
    // a missing .env is the common case
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = merge(partial, Settings::default());
    validate(&settings)?;
    Ok(settings)
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let bus = partial.bus;
    let logging = partial.logging;

    Settings {
        bus: BusSettings {
            throttle_interval_ms: bus
                .as_ref()
                .and_then(|b| b.throttle_interval_ms)
                .unwrap_or(default.bus.throttle_interval_ms),
            max_queue_len: bus
                .as_ref()
                .and_then(|b| b.max_queue_len)
                .or(default.bus.max_queue_len),
            overflow_policy: bus
                .as_ref()
                .and_then(|b| b.overflow_policy)
                .unwrap_or(default.bus.overflow_policy),
            rearm_on_publish: bus
                .as_ref()
                .and_then(|b| b.rearm_on_publish)
                .unwrap_or(default.bus.rearm_on_publish),
        },
        logging: LoggingSettings {
            level: logging
                .and_then(|l| l.level)
                .unwrap_or(default.logging.level),
        },
    }
}

/// Rejects settings the application cannot run with.
pub fn validate(settings: &Settings) -> Result<(), SettingsError> {
    settings.bus.validate()
}
