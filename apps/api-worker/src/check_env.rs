//! Readiness check of a `.env` file against the hardened-deployment rules.

use anyhow::Context;
use std::path::Path;

use modrouter_bootstrap::{validate_hardened, DotenvSource, FatalConfigError};

/// Outcome of a readiness check, as the lines an operator reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub lines: Vec<String>,
}

impl Verdict {
    fn fail(lines: Vec<String>) -> Self {
        Self {
            passed: false,
            lines,
        }
    }
}

pub fn check_env_file(path: &Path) -> anyhow::Result<Verdict> {
    if !path.exists() {
        return Ok(Verdict::fail(vec![format!(
            "Missing {} file. Create one from .env.sample.",
            path.display()
        )]));
    }

    let source = DotenvSource::from_path(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    Ok(match validate_hardened(&source) {
        Ok(()) => Verdict {
            passed: true,
            lines: vec!["Deployment readiness check passed.".to_string()],
        },
        Err(FatalConfigError::MissingRequired { keys }) => {
            let mut lines = vec![format!("Missing required values in {}:", path.display())];
            lines.extend(keys.iter().map(|k| format!("- {k}")));
            Verdict::fail(lines)
        }
        Err(other) => Verdict::fail(vec![other.to_string()]),
    })
}
