use crate::module_key::ModuleKey;
use crate::store::AbsentReason;
use thiserror::Error;

/// Per-request routing errors. None of them are retried by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The module has no usable configuration. Recoverable by the caller.
    #[error("module '{module}' is unavailable: {reason}")]
    ModuleUnavailable {
        module: ModuleKey,
        reason: AbsentReason,
    },

    /// Data access was requested outside any module scope. A programming defect.
    #[error("no active module context: data access must run inside ModuleContext::run_as")]
    NoActiveContext,

    #[error("bundle for '{module}' has the {actual} repository set, not {expected}")]
    SchemaMismatch {
        module: ModuleKey,
        expected: ModuleKey,
        actual: ModuleKey,
    },

    #[error("failed to build repository bundle for '{module}'")]
    Build {
        module: ModuleKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("query on '{module}' failed")]
    Query {
        module: ModuleKey,
        #[source]
        source: anyhow::Error,
    },
}

impl RouterError {
    /// True for errors the caller can reasonably degrade around.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RouterError::ModuleUnavailable { .. })
    }
}
