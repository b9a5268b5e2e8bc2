//! The query executor seam. The router never speaks a wire protocol itself; every
//! statement a repository issues goes through one of these.

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::ConnectionDescriptor;

/// Pool sizing applied when a descriptor does not carry its own limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// The descriptor this executor is bound to.
    fn descriptor(&self) -> &ConnectionDescriptor;

    /// Run a statement, returning the number of affected rows.
    async fn execute(&self, statement: &str, params: &[String]) -> anyhow::Result<u64>;

    /// Run a query and read the first column of the first row as an integer.
    async fn fetch_i64(&self, statement: &str, params: &[String]) -> anyhow::Result<Option<i64>>;
}

/// Executor backed by a lazily connecting `sqlx` pool.
pub struct SqlxExecutor {
    descriptor: Arc<ConnectionDescriptor>,
    pool: AnyPool,
}

impl SqlxExecutor {
    /// Build the pool without opening a connection; the first query connects.
    pub fn connect_lazy(
        descriptor: Arc<ConnectionDescriptor>,
        settings: &PoolSettings,
    ) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();

        let max_connections = descriptor
            .connection_limit()
            .unwrap_or(settings.max_connections);

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy(&descriptor.executor_url())?;

        Ok(Self { descriptor, pool })
    }
}

#[async_trait]
impl QueryExecutor for SqlxExecutor {
    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    async fn execute(&self, statement: &str, params: &[String]) -> anyhow::Result<u64> {
        let mut query = sqlx::query(statement);
        for p in params {
            query = query.bind(p.as_str());
        }
        let done = query.execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn fetch_i64(&self, statement: &str, params: &[String]) -> anyhow::Result<Option<i64>> {
        let mut query = sqlx::query(statement);
        for p in params {
            query = query.bind(p.as_str());
        }
        let row = query.fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<i64, _>(0)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for SqlxExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxExecutor")
            .field("descriptor", &self.descriptor)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}
