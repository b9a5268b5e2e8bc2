//! In-memory test doubles for the executor and bundle factory seams.
//!
//! Compiled for this crate's tests and for downstream crates that enable the
//! `testing` feature.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::ConnectionDescriptor;
use crate::module_key::ModuleKey;
use crate::repos::{BundleFactory, QueryExecutor, RepositoryBundle};

/// One statement seen by a [`MemoryExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatement {
    pub statement: String,
    pub params: Vec<String>,
}

/// Executor that never touches a network. Counts are answered per table from a
/// preset map; everything it runs is recorded.
pub struct MemoryExecutor {
    descriptor: Arc<ConnectionDescriptor>,
    counts: HashMap<String, i64>,
    affected: u64,
    fail: bool,
    log: Mutex<Vec<RecordedStatement>>,
}

impl MemoryExecutor {
    pub fn new(descriptor: Arc<ConnectionDescriptor>) -> Self {
        Self {
            descriptor,
            counts: HashMap::new(),
            affected: 1,
            fail: false,
            log: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_count(mut self, table: &str, count: i64) -> Self {
        self.counts.insert(table.to_string(), count);
        self
    }

    #[must_use]
    pub fn with_counts(mut self, counts: &HashMap<String, i64>) -> Self {
        self.counts.extend(counts.iter().map(|(k, v)| (k.clone(), *v)));
        self
    }

    #[must_use]
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Every statement fails with an error.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.log.lock().clone()
    }

    fn record(&self, statement: &str, params: &[String]) -> anyhow::Result<()> {
        self.log.lock().push(RecordedStatement {
            statement: statement.to_string(),
            params: params.to_vec(),
        });
        if self.fail {
            anyhow::bail!("memory executor for {} is set to fail", self.descriptor.database());
        }
        Ok(())
    }

    fn count_for(&self, statement: &str) -> i64 {
        let engine = self.descriptor.engine();
        self.counts
            .iter()
            .find(|(table, _)| statement.contains(&engine.quote_ident(table)))
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for MemoryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExecutor")
            .field("descriptor", &self.descriptor)
            .field("statements", &self.log.lock().len())
            .finish()
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    async fn execute(&self, statement: &str, params: &[String]) -> anyhow::Result<u64> {
        self.record(statement, params)?;
        Ok(self.affected)
    }

    async fn fetch_i64(&self, statement: &str, params: &[String]) -> anyhow::Result<Option<i64>> {
        self.record(statement, params)?;
        if statement == "SELECT 1" {
            return Ok(Some(1));
        }
        Ok(Some(self.count_for(statement)))
    }
}

/// Factory that binds bundles onto [`MemoryExecutor`]s and counts every build.
#[derive(Default)]
pub struct CountingFactory {
    builds: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
    counts: HashMap<String, i64>,
    built: Mutex<Vec<(ModuleKey, Arc<MemoryExecutor>)>>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every build so concurrent callers pile up on the same cell.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every build fails.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Preset row count answered for `table` by every executor this factory builds.
    #[must_use]
    pub fn with_count(mut self, table: &str, count: i64) -> Self {
        self.counts.insert(table.to_string(), count);
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn builds_for(&self, module: ModuleKey) -> usize {
        self.built.lock().iter().filter(|(m, _)| *m == module).count()
    }

    /// The executor behind the most recent bundle built for `module`.
    pub fn executor_for(&self, module: ModuleKey) -> Option<Arc<MemoryExecutor>> {
        self.built
            .lock()
            .iter()
            .rev()
            .find(|(m, _)| *m == module)
            .map(|(_, e)| Arc::clone(e))
    }
}

#[async_trait]
impl BundleFactory for CountingFactory {
    async fn build(
        &self,
        module: ModuleKey,
        descriptor: Arc<ConnectionDescriptor>,
    ) -> anyhow::Result<RepositoryBundle> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("bundle build for {module} refused by test factory");
        }

        let executor = Arc::new(MemoryExecutor::new(descriptor).with_counts(&self.counts));
        self.built.lock().push((module, Arc::clone(&executor)));
        Ok(RepositoryBundle::bind(module, executor))
    }
}
