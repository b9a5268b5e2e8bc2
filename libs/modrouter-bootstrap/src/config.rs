use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use modrouter::PoolSettings;

use crate::error::ConfigError;

/// Worker process configuration. Connection strings are not part of it; those come from
/// the [`ConfigSource`](crate::ConfigSource) during bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    pub file: String,          // "logs/worker.log"
    #[serde(default)]
    pub file_level: String,
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>, // How many files to keep
    #[serde(default)]
    pub max_size_mb: Option<u64>, // Max size of the file in MB
}

/// Pool defaults applied to every module unless its connection string carries
/// `connectionLimit`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Period of the short timer job.
    #[serde(default = "default_short_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Whether the daily job fires at local midnight.
    #[serde(default = "default_true")]
    pub midnight: bool,
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_acquire_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_short_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

const fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: default_short_interval(),
            midnight: default_true(),
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/api-worker.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            logging: Some(default_logging_config()),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        Self::extract_layers(Some(config_path.as_ref()))
    }

    /// Load configuration from file or fall back to defaults (still honoring `APP__` env).
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut config = Self::extract_layers(None)?;
                if config.logging.is_none() {
                    config.logging = Some(default_logging_config());
                }
                Ok(config)
            }
        }
    }

    fn extract_layers(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Logging stays None unless YAML/ENV provide it.
        let base = WorkerConfig {
            logging: None,
            ..WorkerConfig::default()
        };

        let mut figment = Figment::new().merge(Serialized::defaults(base));
        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }
        // Example: APP__SCHEDULER__INTERVAL=5m maps to scheduler.interval
        figment = figment.merge(Env::prefixed("APP__").split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::Extract(Box::new(e)))
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(interval) = args.interval {
            self.scheduler.interval = interval;
        }

        // Set logging level based on verbose flags for "default" section.
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub interval: Option<Duration>,
    pub print_config: bool,
    pub verbose: u8,
}

#[cfg(test)]
mod tests;
