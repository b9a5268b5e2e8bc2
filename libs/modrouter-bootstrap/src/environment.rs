//! Deployment environment selection and hardened-mode validation.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use modrouter::ModuleKey;

use crate::config_source::ConfigSource;
use crate::error::FatalConfigError;

pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";

/// Marker that flags a value copied from a sample file and never filled in.
const PLACEHOLDER_MARKER: &str = "REPLACE_ME";

/// Hosted default domain; self-hosted deployments must not point at it.
const RESERVED_API_DOMAIN: &str = "churchapps.org";

const REQUIRED_SETTINGS: [&str; 11] = [
    "API_URL",
    "MESSAGING_API",
    "SERVER_PORT",
    "SOCKET_URL",
    "MAIL_SYSTEM",
    "SMTP_HOST",
    "SMTP_USER",
    "SMTP_PASS",
    "ENCRYPTION_KEY",
    "JWT_SECRET",
    "SUPPORT_EMAIL",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Demo,
    Staging,
    Prod,
}

impl Environment {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Demo => "demo",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Hardened environments refuse to start on incomplete configuration.
    pub const fn is_hardened(&self) -> bool {
        matches!(self, Environment::Prod)
    }

    /// Read `ENVIRONMENT` from `source`; unset or blank means `dev`.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, FatalConfigError> {
        match source.get(ENVIRONMENT_VAR) {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Ok(Environment::default()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = FatalConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "demo" => Ok(Environment::Demo),
            "staging" => Ok(Environment::Staging),
            "prod" => Ok(Environment::Prod),
            other => Err(FatalConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// Every key a hardened deployment must define.
pub fn required_keys() -> impl Iterator<Item = &'static str> {
    REQUIRED_SETTINGS
        .into_iter()
        .chain(ModuleKey::PRIMARY.into_iter().map(|k| k.config_var()))
}

/// Unset, blank, or still carrying the sample-file marker.
pub fn is_placeholder(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.trim().is_empty() || v.contains(PLACEHOLDER_MARKER),
    }
}

/// Check `source` against the hardened-deployment rules.
///
/// Missing keys are reported together; the domain and mail checks only run once every
/// required key is present.
pub fn validate_hardened(source: &dyn ConfigSource) -> Result<(), FatalConfigError> {
    let missing: Vec<String> = required_keys()
        .filter(|key| is_placeholder(source.get(key).as_deref()))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(FatalConfigError::MissingRequired { keys: missing });
    }

    let api_url = source.get("API_URL").unwrap_or_default();
    if api_url.contains(RESERVED_API_DOMAIN) {
        return Err(FatalConfigError::ReservedApiUrl { value: api_url });
    }

    let mail = source.get("MAIL_SYSTEM").unwrap_or_default();
    if mail != "SMTP" {
        return Err(FatalConfigError::MailSystem { value: mail });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_source::MapSource;

    fn complete_source() -> MapSource {
        let mut source = MapSource::new("test")
            .with("API_URL", "https://api.example.com")
            .with("MESSAGING_API", "https://api.example.com/messaging")
            .with("SERVER_PORT", "8084")
            .with("SOCKET_URL", "wss://socket.example.com")
            .with("MAIL_SYSTEM", "SMTP")
            .with("SMTP_HOST", "smtp.example.com")
            .with("SMTP_USER", "mailer")
            .with("SMTP_PASS", "secret")
            .with("ENCRYPTION_KEY", "k")
            .with("JWT_SECRET", "j")
            .with("SUPPORT_EMAIL", "support@example.com");
        for key in ModuleKey::PRIMARY {
            source.set(key.config_var(), format!("mysql://u:p@db/{key}"));
        }
        source
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert_eq!(" staging ".parse::<Environment>(), Ok(Environment::Staging));
        assert_eq!(
            "qa".parse::<Environment>(),
            Err(FatalConfigError::UnknownEnvironment("qa".into()))
        );
        assert!(Environment::Prod.is_hardened());
        assert!(!Environment::Staging.is_hardened());
    }

    #[test]
    fn test_environment_defaults_to_dev() {
        let source = MapSource::new("empty");
        assert_eq!(Environment::from_source(&source), Ok(Environment::Dev));
        let source = MapSource::new("blank").with(ENVIRONMENT_VAR, "  ");
        assert_eq!(Environment::from_source(&source), Ok(Environment::Dev));
    }

    #[test]
    fn test_required_keys_cover_primary_connections() {
        let keys: Vec<_> = required_keys().collect();
        assert_eq!(keys.len(), 18);
        assert!(keys.contains(&"REPORTING_CONNECTION_STRING"));
        assert!(!keys.contains(&"DOING_MEMBERSHIP_CONNECTION_STRING"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder(None));
        assert!(is_placeholder(Some("")));
        assert!(is_placeholder(Some("   ")));
        assert!(is_placeholder(Some("mysql://REPLACE_ME@db/x")));
        assert!(!is_placeholder(Some("value")));
    }

    #[test]
    fn test_complete_config_passes() {
        assert_eq!(validate_hardened(&complete_source()), Ok(()));
    }

    #[test]
    fn test_all_missing_keys_reported_together() {
        let mut source = complete_source();
        source.remove("SMTP_PASS");
        source.set("JWT_SECRET", "REPLACE_ME");
        source.set("GIVING_CONNECTION_STRING", " ");

        assert_eq!(
            validate_hardened(&source),
            Err(FatalConfigError::MissingRequired {
                keys: vec![
                    "SMTP_PASS".into(),
                    "JWT_SECRET".into(),
                    "GIVING_CONNECTION_STRING".into()
                ]
            })
        );
    }

    #[test]
    fn test_reserved_api_domain_rejected() {
        let source = complete_source().with("API_URL", "https://api.churchapps.org");
        assert!(matches!(
            validate_hardened(&source),
            Err(FatalConfigError::ReservedApiUrl { .. })
        ));
    }

    #[test]
    fn test_mail_system_must_be_smtp() {
        let source = complete_source().with("MAIL_SYSTEM", "SES");
        assert_eq!(
            validate_hardened(&source),
            Err(FatalConfigError::MailSystem {
                value: "SES".into()
            })
        );
    }
}
