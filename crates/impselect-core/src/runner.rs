//! The cached query runner: execution core and single-task selection.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec;
use crate::config::{
    ensure_dir, resolve_config, ConfigSources, EffectiveConfig, RetryPolicy, RunnerOptions,
};
use crate::engine::{
    Connector, EngineError, QueryOutput, ResultKind, ScopedConnection, Status,
};
use crate::error::ImpselectResult;
use crate::paths;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::table::Table;

/// Runs SQL against a remote engine and caches result sets on disk.
///
/// Configuration and the cache directory are resolved once, in the
/// constructor, and fixed for the runner's lifetime.
pub struct QueryRunner {
    name: String,
    config: EffectiveConfig,
    connector: Arc<dyn Connector>,
    pub(crate) sleeper: Arc<dyn Sleeper>,
}

impl QueryRunner {
    /// Build a runner, reading `.impselect.txt` from the current and home
    /// directories.
    pub fn new(
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
        options: RunnerOptions,
    ) -> ImpselectResult<Self> {
        Self::with_sources(name, connector, options, &ConfigSources::discover())
    }

    /// Build a runner from an explicit set of config files.
    pub fn with_sources(
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
        options: RunnerOptions,
        sources: &ConfigSources,
    ) -> ImpselectResult<Self> {
        let name = name.into();
        let layers = sources.load()?;
        let config = resolve_config(&name, &options, &layers)?;
        ensure_dir(&config.dir)?;

        debug!(
            runner = %name,
            dir = %config.dir.display(),
            verbose = config.verbose,
            retry = ?config.retry,
            "runner configured"
        );

        Ok(Self {
            name,
            config,
            connector,
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    /// Replace the wait used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn verbose(&self) -> i64 {
        self.config.verbose
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.config.retry.as_ref()
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub(crate) fn announce(&self) -> bool {
        self.config.verbose >= 1
    }

    /// Run one statement on a fresh connection. Never retries.
    pub fn execute(&self, sql: &str, kind: ResultKind) -> ImpselectResult<QueryOutput> {
        debug!(runner = %self.name, sql, ?kind, "executing statement");
        let mut conn = ScopedConnection::open(self.connector.as_ref(), &self.config.connection)?;
        Ok(conn.run(sql, kind)?)
    }

    /// Run a statement and decode its result set.
    pub fn query(&self, sql: &str) -> ImpselectResult<Table> {
        match self.execute(sql, ResultKind::Table)? {
            QueryOutput::Table(table) => Ok(table),
            QueryOutput::Status(_) => Err(EngineError::other("expected a result set").into()),
        }
    }

    /// Run a statement and return the engine status.
    pub fn execute_status(&self, sql: &str) -> ImpselectResult<Status> {
        match self.execute(sql, ResultKind::Status)? {
            QueryOutput::Status(status) => Ok(status),
            QueryOutput::Table(_) => Err(EngineError::other("expected a status").into()),
        }
    }

    /// `CREATE TABLE <table_name> AS (<sql>)`.
    pub fn create_table(&self, sql: &str, table_name: &str) -> ImpselectResult<Status> {
        let status = self.execute_status(&format!("CREATE TABLE {} AS ({})", table_name, sql))?;
        if self.announce() {
            info!(table = table_name, status = %status, "create table");
        }
        Ok(status)
    }

    /// `DROP TABLE IF EXISTS <table_name>`, with `PURGE` when `purge` is set.
    pub fn drop_table(&self, table_name: &str, purge: bool) -> ImpselectResult<Status> {
        let mut sql = format!("DROP TABLE IF EXISTS {}", table_name);
        if purge {
            sql.push_str(" PURGE");
        }
        let status = self.execute_status(&sql)?;
        if self.announce() {
            info!(table = table_name, status = %status, "drop table");
        }
        Ok(status)
    }

    /// `DESCRIBE <table_name>`.
    pub fn describe_table(&self, table_name: &str) -> ImpselectResult<Table> {
        self.query(&format!("DESCRIBE {}", table_name))
    }

    pub fn task_path(&self, name: &str) -> PathBuf {
        paths::task_path(&self.config.dir, name)
    }

    pub fn batch_partition_path(&self, name: &str, itervar: &dyn Display) -> PathBuf {
        paths::batch_partition_path(&self.config.dir, name, itervar)
    }

    /// Whether a cache file exists for task `name`. Contents are not checked.
    pub fn is_cached(&self, name: &str) -> bool {
        self.task_path(name).is_file()
    }

    /// Load the cached table of task `name`.
    pub fn load(&self, name: &str) -> ImpselectResult<Table> {
        codec::read_table(&self.task_path(name))
    }

    /// Store `table` as the cached result of task `name`.
    pub fn save(&self, table: &Table, name: &str) -> ImpselectResult<()> {
        codec::write_table(&self.task_path(name), table).map(|_| ())
    }

    /// Delete the cache file of task `name`. Returns whether one existed.
    pub fn evict(&self, name: &str) -> ImpselectResult<bool> {
        remove_if_exists(&self.task_path(name))
    }

    /// Run `sql`, caching the result under `name` when given.
    ///
    /// A cache hit skips the engine entirely. With `table_name`, the result
    /// is first materialized as a real table (dropped and recreated), then
    /// read back with `SELECT * FROM <table_name>`. A named result is
    /// returned in its cached form, so a miss and a later hit agree.
    pub fn select(
        &self,
        sql: &str,
        name: Option<&str>,
        table_name: Option<&str>,
    ) -> ImpselectResult<Table> {
        if let Some(name) = name {
            let path = self.task_path(name);
            if path.is_file() {
                if self.announce() {
                    info!(task = name, path = %path.display(), "cached data exists, skipping query");
                }
                return codec::read_table(&path);
            }
        }

        let table = match table_name {
            Some(table_name) => {
                self.drop_table(table_name, true)?;
                self.create_table(sql, table_name)?;
                self.query(&format!("SELECT * FROM {}", table_name))?
            }
            None => self.query(sql)?,
        };

        let Some(name) = name else {
            return Ok(table);
        };

        // Hand back the stored form so a later hit returns the same table.
        let path = self.task_path(name);
        let stored = codec::write_table(&path, &table)?;
        if self.announce() {
            info!(task = name, path = %path.display(), rows = stored.num_rows(), "data written");
        }
        Ok(stored)
    }

    /// Make sure task `name` is cached, without returning its data.
    pub fn prepare(&self, sql: &str, name: &str) -> ImpselectResult<()> {
        self.select(sql, Some(name), None).map(|_| ())
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> ImpselectResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
