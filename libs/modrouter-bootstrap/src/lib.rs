//! Process-level plumbing around the module router: configuration sources, the
//! once-per-process bootstrap, hardened-environment validation, logging and signals.

pub mod bootstrap;
pub mod config;
pub mod config_source;
pub mod environment;
pub mod error;
pub mod logging;
pub mod signals;

pub use bootstrap::{BootstrapReport, FailedModule, ProcessBootstrap};
pub use config::{
    default_logging_config, CliArgs, DatabaseConfig, LoggingConfig, SchedulerConfig, Section,
    WorkerConfig,
};
pub use config_source::{ConfigSource, DotenvSource, EnvSource, MapSource};
pub use environment::{is_placeholder, required_keys, validate_hardened, Environment};
pub use error::{ConfigError, FatalConfigError};
pub use logging::{init_logging, init_minimal};
pub use signals::{wait_for_shutdown, ShutdownSignal};
