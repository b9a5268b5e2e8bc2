//! Warm process state shared by every invocation.

use std::sync::{Arc, OnceLock};

use anyhow::Context;
use modrouter::{
    BundleFactory, ModuleContext, ModuleKey, RepositoryBundle, RepositoryRegistry,
    SqlxBundleFactory,
};
use modrouter_bootstrap::{BootstrapReport, ConfigSource, ProcessBootstrap, WorkerConfig};

/// Bootstrap guard, repository registry and the source configuration is read from.
///
/// Built once per process; every job invocation borrows it.
pub struct WorkerRuntime {
    bootstrap: &'static ProcessBootstrap,
    registry: RepositoryRegistry,
    source: Arc<dyn ConfigSource>,
}

impl WorkerRuntime {
    pub fn new(
        bootstrap: &'static ProcessBootstrap,
        factory: Arc<dyn BundleFactory>,
        source: Arc<dyn ConfigSource>,
    ) -> Self {
        let registry = RepositoryRegistry::new(Arc::clone(bootstrap.store()), factory);
        Self {
            bootstrap,
            registry,
            source,
        }
    }

    /// The process-wide runtime over [`ProcessBootstrap::global`]. The first caller's
    /// configuration and source win.
    pub fn global(config: &WorkerConfig, source: Arc<dyn ConfigSource>) -> Arc<WorkerRuntime> {
        static GLOBAL: OnceLock<Arc<WorkerRuntime>> = OnceLock::new();
        let runtime = GLOBAL.get_or_init(|| {
            let factory = Arc::new(SqlxBundleFactory::new(config.database.pool_settings()));
            Arc::new(WorkerRuntime::new(
                ProcessBootstrap::global(),
                factory,
                source,
            ))
        });
        Arc::clone(runtime)
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    pub fn bootstrap(&self) -> &ProcessBootstrap {
        self.bootstrap
    }

    /// Make sure configuration is loaded; cheap after the first call.
    pub fn init_env(&self) -> anyhow::Result<Arc<BootstrapReport>> {
        if self.bootstrap.is_initialized() {
            tracing::debug!("Environment already initialized (warm start)");
        } else {
            tracing::info!(source = self.source.name(), "Initializing environment");
        }
        self.bootstrap
            .ensure_initialized(self.source.as_ref())
            .context("bootstrap failed")
    }

    /// Bundle for the module the calling unit of work is scoped to.
    pub async fn repos(&self) -> anyhow::Result<Arc<RepositoryBundle>> {
        let module = ModuleContext::current();
        self.registry
            .get_for_current_context()
            .await
            .with_context(|| match module {
                Some(m) => format!("no repositories for module '{m}'"),
                None => "data access outside a module scope".to_string(),
            })
    }

    /// Run `work` scoped to `module`.
    pub async fn within<F, T>(&self, module: ModuleKey, work: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        ModuleContext::run_as(module, work).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use modrouter::testing::CountingFactory;
    use modrouter::ConnectionConfigStore;
    use modrouter_bootstrap::MapSource;

    /// A runtime over a private bootstrap, leaked to get the `'static` borrow entry
    /// points normally take from the global.
    pub(crate) fn runtime_with(
        source: MapSource,
        factory: Arc<CountingFactory>,
    ) -> Arc<WorkerRuntime> {
        let bootstrap: &'static ProcessBootstrap = Box::leak(Box::new(ProcessBootstrap::new(
            Arc::new(ConnectionConfigStore::new()),
        )));
        Arc::new(WorkerRuntime::new(bootstrap, factory, Arc::new(source)))
    }

    pub(crate) fn full_source() -> MapSource {
        let mut source = MapSource::new("test");
        for key in ModuleKey::PRIMARY {
            source.set(key.config_var(), format!("mysql://api:pw@db/{key}"));
        }
        source
    }
}
