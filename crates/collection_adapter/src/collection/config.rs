use crate::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use garde::Validate;
use serde::{Deserialize, Serialize};

const SERVICE_NAME: &str = "bugtrackr";

/// Adapter configuration, read from `BUGTRACKR_*` environment variables
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CollectionConfig {
    /// Collection shared by every entity kind
    #[serde(default = "default_collection_name")]
    #[garde(length(min = 1))]
    pub collection_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    #[garde(length(min = 1))]
    pub log_level: String,
}

fn default_collection_name() -> String {
    "ameya_tests".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            log_level: default_log_level(),
        }
    }
}

impl CollectionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("BUGTRACKR"))
            .build()?
            .try_deserialize()
    }

    /// Logging setup for the service that owns this adapter
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig::new(SERVICE_NAME, &self.log_level)
    }
}
