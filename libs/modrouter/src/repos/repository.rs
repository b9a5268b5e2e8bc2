use std::sync::Arc;

use super::executor::QueryExecutor;
use crate::error::RouterError;
use crate::module_key::ModuleKey;

/// A named data-access handle over one table of a module database.
///
/// Only engine-neutral primitives live here; domain queries are layered on top by the
/// modules that own them.
#[derive(Clone)]
pub struct Repository {
    module: ModuleKey,
    name: &'static str,
    table: &'static str,
    executor: Arc<dyn QueryExecutor>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("table", &self.table)
            .finish()
    }
}

impl Repository {
    pub fn new(
        module: ModuleKey,
        name: &'static str,
        table: &'static str,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            module,
            name,
            table,
            executor,
        }
    }

    pub fn module(&self) -> ModuleKey {
        self.module
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    pub async fn count(&self) -> Result<i64, RouterError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.quoted_table());
        let n = self
            .executor
            .fetch_i64(&sql, &[])
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(n.unwrap_or(0))
    }

    pub async fn exists(&self, id: &str) -> Result<bool, RouterError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE id = {}",
            self.quoted_table(),
            self.placeholder(1)
        );
        let n = self
            .executor
            .fetch_i64(&sql, &[id.to_string()])
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(n.unwrap_or(0) > 0)
    }

    /// Delete one row by id; returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, RouterError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = {}",
            self.quoted_table(),
            self.placeholder(1)
        );
        let affected = self
            .executor
            .execute(&sql, &[id.to_string()])
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(affected > 0)
    }

    fn quoted_table(&self) -> String {
        self.executor.descriptor().engine().quote_ident(self.table)
    }

    fn placeholder(&self, n: usize) -> String {
        self.executor.descriptor().engine().placeholder(n)
    }

    fn query_error(&self, source: anyhow::Error) -> RouterError {
        tracing::warn!(
            module = %self.module,
            repository = self.name,
            error = %source,
            "Repository query failed"
        );
        RouterError::Query {
            module: self.module,
            source,
        }
    }
}
