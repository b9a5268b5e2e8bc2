//! Once-per-process loading of module connection configuration.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use modrouter::{AbsentReason, ConnectionConfigStore, ModuleKey};

use crate::config_source::ConfigSource;
use crate::environment::{validate_hardened, Environment};
use crate::error::FatalConfigError;

/// A module that could not be loaded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedModule {
    pub module: ModuleKey,
    pub reason: AbsentReason,
}

/// What the first bootstrap of this process found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub environment: Environment,
    pub hardened: bool,
    pub loaded: Vec<ModuleKey>,
    pub failed: Vec<FailedModule>,
}

type Outcome = Result<Arc<BootstrapReport>, FatalConfigError>;

/// Guards the one-time load of every module's connection string into the store.
///
/// Entry points call [`ProcessBootstrap::ensure_initialized`] at the start of every
/// invocation. The first call loads; every other call, concurrent or later, gets the
/// memoised outcome without reading configuration again. A fatal outcome is memoised
/// too, so a misconfigured process keeps refusing work.
pub struct ProcessBootstrap {
    store: Arc<ConnectionConfigStore>,
    outcome: OnceLock<Outcome>,
    loads: AtomicUsize,
}

impl std::fmt::Debug for ProcessBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessBootstrap")
            .field("initialized", &self.is_initialized())
            .field("loads", &self.load_count())
            .finish()
    }
}

impl ProcessBootstrap {
    pub fn new(store: Arc<ConnectionConfigStore>) -> Self {
        Self {
            store,
            outcome: OnceLock::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// The process-wide instance used by entry points.
    pub fn global() -> &'static ProcessBootstrap {
        static GLOBAL: OnceLock<ProcessBootstrap> = OnceLock::new();
        GLOBAL.get_or_init(|| ProcessBootstrap::new(Arc::new(ConnectionConfigStore::new())))
    }

    pub fn store(&self) -> &Arc<ConnectionConfigStore> {
        &self.store
    }

    /// Load configuration on the first call; return the memoised outcome afterwards.
    pub fn ensure_initialized(&self, source: &dyn ConfigSource) -> Outcome {
        self.outcome
            .get_or_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                load(&self.store, source)
            })
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// The memoised outcome, if bootstrap already ran.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.get().cloned()
    }

    /// How many times configuration was actually read. At most one.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

fn load(store: &ConnectionConfigStore, source: &dyn ConfigSource) -> Outcome {
    let environment = Environment::from_source(source)?;
    let hardened = environment.is_hardened();
    tracing::info!(
        environment = %environment,
        hardened,
        source = source.name(),
        "Bootstrapping module connections"
    );

    if hardened {
        validate_hardened(source).inspect_err(|e| {
            tracing::error!(error = %e, "Hardened configuration check failed");
        })?;
    }

    let mut loaded = Vec::new();
    let mut failed = Vec::new();
    for module in ModuleKey::ALL {
        let var = module.config_var();
        let raw = source.get(var).filter(|v| !v.trim().is_empty());

        let Some(raw) = raw else {
            store.mark_missing(module);
            if module.is_alias() {
                tracing::debug!(module = %module, var, "Optional alias not configured");
            } else {
                tracing::warn!(module = %module, var, "No connection string configured");
            }
            failed.push(FailedModule {
                module,
                reason: AbsentReason::Missing,
            });
            continue;
        };

        match store.load(module, &raw) {
            Ok(descriptor) => {
                tracing::info!(module = %module, descriptor = %descriptor, "Loaded connection");
                loaded.push(module);
            }
            Err(e) => {
                tracing::warn!(module = %module, var, error = %e, "Malformed connection string");
                failed.push(FailedModule {
                    module,
                    reason: AbsentReason::Malformed(e.to_string()),
                });
            }
        }
    }

    let summary = store.summary();
    tracing::info!(
        loaded = summary.loaded.len(),
        total = summary.total,
        missing = ?summary.missing,
        "Connection summary"
    );

    if let Some(critical) = failed.iter().find(|f| f.module.is_critical()) {
        let err = FatalConfigError::CriticalModule {
            module: critical.module,
            reason: critical.reason.clone(),
        };
        tracing::error!(error = %err, "Refusing to start");
        return Err(err);
    }

    Ok(Arc::new(BootstrapReport {
        environment,
        hardened,
        loaded,
        failed,
    }))
}
