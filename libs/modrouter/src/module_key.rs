//! The closed set of data modules a unit of work can operate as.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one physically separate module database.
///
/// `MembershipForDoing` is an alias: the doing module's own view of a membership
/// database. It shares the membership repository shape but is configured and
/// cached independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKey {
    Membership,
    Attendance,
    Content,
    Giving,
    Messaging,
    Doing,
    Reporting,
    MembershipForDoing,
}

impl ModuleKey {
    /// Every key, primary modules first.
    pub const ALL: [ModuleKey; 8] = [
        ModuleKey::Membership,
        ModuleKey::Attendance,
        ModuleKey::Content,
        ModuleKey::Giving,
        ModuleKey::Messaging,
        ModuleKey::Doing,
        ModuleKey::Reporting,
        ModuleKey::MembershipForDoing,
    ];

    /// Modules that own a database of their own (aliases excluded).
    pub const PRIMARY: [ModuleKey; 7] = [
        ModuleKey::Membership,
        ModuleKey::Attendance,
        ModuleKey::Content,
        ModuleKey::Giving,
        ModuleKey::Messaging,
        ModuleKey::Doing,
        ModuleKey::Reporting,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ModuleKey::Membership => "membership",
            ModuleKey::Attendance => "attendance",
            ModuleKey::Content => "content",
            ModuleKey::Giving => "giving",
            ModuleKey::Messaging => "messaging",
            ModuleKey::Doing => "doing",
            ModuleKey::Reporting => "reporting",
            ModuleKey::MembershipForDoing => "membership-for-doing",
        }
    }

    /// The single configuration variable holding this module's connection string.
    pub const fn config_var(&self) -> &'static str {
        match self {
            ModuleKey::Membership => "MEMBERSHIP_CONNECTION_STRING",
            ModuleKey::Attendance => "ATTENDANCE_CONNECTION_STRING",
            ModuleKey::Content => "CONTENT_CONNECTION_STRING",
            ModuleKey::Giving => "GIVING_CONNECTION_STRING",
            ModuleKey::Messaging => "MESSAGING_CONNECTION_STRING",
            ModuleKey::Doing => "DOING_CONNECTION_STRING",
            ModuleKey::Reporting => "REPORTING_CONNECTION_STRING",
            ModuleKey::MembershipForDoing => "DOING_MEMBERSHIP_CONNECTION_STRING",
        }
    }

    /// The repository shape a bundle for this key carries.
    pub const fn schema(&self) -> ModuleKey {
        match self {
            ModuleKey::MembershipForDoing => ModuleKey::Membership,
            other => *other,
        }
    }

    /// Membership is the only module the process cannot run without.
    pub const fn is_critical(&self) -> bool {
        matches!(self, ModuleKey::Membership)
    }

    pub const fn is_alias(&self) -> bool {
        matches!(self, ModuleKey::MembershipForDoing)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown module '{0}'")]
pub struct UnknownModule(pub String);

impl FromStr for ModuleKey {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ModuleKey::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| UnknownModule(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_all_keys() {
        for key in ModuleKey::ALL {
            assert_eq!(key.as_str().parse::<ModuleKey>(), Ok(key));
        }
        assert_eq!(" Messaging ".parse::<ModuleKey>(), Ok(ModuleKey::Messaging));
    }

    #[test]
    fn test_unknown_module() {
        let err = "bridge".parse::<ModuleKey>().unwrap_err();
        assert_eq!(err.to_string(), "unknown module 'bridge'");
    }

    #[test]
    fn test_alias_shares_membership_schema() {
        assert_eq!(ModuleKey::MembershipForDoing.schema(), ModuleKey::Membership);
        assert_eq!(ModuleKey::Doing.schema(), ModuleKey::Doing);
        assert!(ModuleKey::MembershipForDoing.is_alias());
        assert!(!ModuleKey::PRIMARY.iter().any(|k| k.is_alias()));
    }

    #[test]
    fn test_only_membership_is_critical() {
        let critical: Vec<_> = ModuleKey::ALL.iter().filter(|k| k.is_critical()).collect();
        assert_eq!(critical, vec![&ModuleKey::Membership]);
    }

    #[test]
    fn test_config_vars_are_unique() {
        let mut vars: Vec<_> = ModuleKey::ALL.iter().map(|k| k.config_var()).collect();
        vars.sort_unstable();
        vars.dedup();
        assert_eq!(vars.len(), ModuleKey::ALL.len());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ModuleKey::MembershipForDoing).unwrap();
        assert_eq!(json, "\"membership-for-doing\"");
    }
}
