use async_trait::async_trait;
use std::sync::Arc;

use super::bundle::RepositoryBundle;
use super::executor::{PoolSettings, QueryExecutor, SqlxExecutor};
use crate::descriptor::ConnectionDescriptor;
use crate::module_key::ModuleKey;

/// Builds the repository bundle for one module from its descriptor.
///
/// The registry calls this at most once per module per process.
#[async_trait]
pub trait BundleFactory: Send + Sync {
    async fn build(
        &self,
        module: ModuleKey,
        descriptor: Arc<ConnectionDescriptor>,
    ) -> anyhow::Result<RepositoryBundle>;
}

/// Default factory: a lazily connecting `sqlx` pool per module.
#[derive(Debug, Clone, Default)]
pub struct SqlxBundleFactory {
    settings: PoolSettings,
}

impl SqlxBundleFactory {
    pub fn new(settings: PoolSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

#[async_trait]
impl BundleFactory for SqlxBundleFactory {
    async fn build(
        &self,
        module: ModuleKey,
        descriptor: Arc<ConnectionDescriptor>,
    ) -> anyhow::Result<RepositoryBundle> {
        let executor = SqlxExecutor::connect_lazy(descriptor, &self.settings)?;
        let executor: Arc<dyn QueryExecutor> = Arc::new(executor);
        Ok(RepositoryBundle::bind(module, executor))
    }
}
