use std::path::PathBuf;
use thiserror::Error;

use modrouter::{AbsentReason, ModuleKey};

/// Conditions that must stop the process before it serves anything.
///
/// Cloneable so a memoised bootstrap can hand the same failure to every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalConfigError {
    #[error("required configuration missing or left as a placeholder: {}", .keys.join(", "))]
    MissingRequired { keys: Vec<String> },

    #[error("API_URL must point at your own deployment, not the reserved default domain ({value})")]
    ReservedApiUrl { value: String },

    #[error("MAIL_SYSTEM must be SMTP in hardened environments (got '{value}')")]
    MailSystem { value: String },

    #[error("unknown ENVIRONMENT '{0}' (expected dev, demo, staging or prod)")]
    UnknownEnvironment(String),

    #[error("critical module '{module}' has no usable connection: {reason}")]
    CriticalModule {
        module: ModuleKey,
        reason: AbsentReason,
    },
}

/// Failures reading worker configuration or env files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("failed to extract worker configuration")]
    Extract(#[source] Box<figment::Error>),

    #[error("failed to serialize worker configuration")]
    Serialize(#[from] serde_yaml::Error),
}
