use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::sql::executor::{Executor, QueryResult};
use crate::sql::lexer::split_statements;
use crate::sql::parser::parse_statement;
use crate::storage::catalog::Catalog;

/// An in-memory database: one catalog plus the statement pipeline.
///
/// Every call to [`Engine::execute`] runs one statement to completion. A
/// failed statement leaves the catalog as it was.
#[derive(Debug, Default)]
pub struct Engine {
    catalog: Catalog,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
        }
    }

    pub fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let stmt = parse_statement(sql)?;
        Executor::new(&mut self.catalog).execute(&stmt)
    }

    /// Runs every statement of a `;`-separated script in order, stopping at
    /// the first failure. Changes made by the statements before it stay in
    /// the catalog.
    pub fn execute_script(&mut self, script: &str) -> Result<Vec<QueryResult>> {
        let statements = split_statements(script);
        debug!(statements = statements.len(), "running script");
        statements.into_iter().map(|sql| self.execute(sql)).collect()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// Cloneable handle to one [`Engine`] shared between threads. Statements are
/// serialized by a single lock.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new() -> Self {
        Self::from_engine(Engine::new())
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.inner.lock().execute(sql)
    }

    /// Runs `f` with the engine locked, e.g. to inspect the catalog.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        f(&mut *self.inner.lock())
    }
}
