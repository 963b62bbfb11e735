//! Batch selection: one cached partition per iteration value.
//!
//! Preparation is resumable. Each partition is written as soon as its query
//! succeeds, and existing partitions are skipped, so rerunning an aborted
//! batch only queries what is missing.

use std::fmt::Display;

use tracing::{debug, info};

use crate::codec;
use crate::error::ImpselectResult;
use crate::retry::run_with_retry;
use crate::runner::{remove_if_exists, QueryRunner};
use crate::table::{Table, Value};
use crate::template;

/// Outcome of [`QueryRunner::prepare_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Partitions queried and written by this call.
    pub written: usize,
    /// Partitions already cached.
    pub skipped: usize,
}

/// Per-partition transform applied while loading a batch.
pub type Transform<'a> = &'a dyn Fn(Table) -> Table;

impl QueryRunner {
    /// Query and cache every missing partition of batch `name`, in order.
    ///
    /// `sql_template` is rendered with `{itervar}` bound to each value.
    /// Transient engine failures are retried under the runner's retry
    /// policy; any other failure, or exhausted retries, aborts the batch
    /// with earlier partitions left in place.
    pub fn prepare_batch<I: Display>(
        &self,
        sql_template: &str,
        itervars: &[I],
        name: &str,
    ) -> ImpselectResult<PrepareReport> {
        let mut report = PrepareReport::default();

        for itervar in itervars {
            let path = self.batch_partition_path(name, itervar);
            if path.is_file() {
                if self.announce() {
                    info!(task = name, itervar = %itervar, "cached partition exists, skipping query");
                }
                report.skipped += 1;
                continue;
            }

            let sql = template::render_itervar(sql_template, &itervar.to_string())?;
            let table = run_with_retry(self.retry_policy(), self.sleeper.as_ref(), |attempt| {
                debug!(task = name, itervar = %itervar, attempt, "querying partition");
                self.query(&sql)
            })?;

            codec::write_table(&path, &table)?;
            report.written += 1;
            if self.announce() {
                info!(
                    task = name,
                    itervar = %itervar,
                    rows = table.num_rows(),
                    "partition written"
                );
            }
        }

        Ok(report)
    }

    /// Load and concatenate the cached partitions of batch `name`.
    ///
    /// Partitions are read in `itervars` order. When `itervar_column` is set,
    /// each partition gets that column filled with the text of its value;
    /// `transform` then runs on each partition before concatenation. A
    /// partition that was never prepared is a cache miss.
    pub fn load_batch<I: Display>(
        &self,
        itervars: &[I],
        name: &str,
        itervar_column: Option<&str>,
        transform: Option<Transform<'_>>,
    ) -> ImpselectResult<Table> {
        let mut parts = Vec::with_capacity(itervars.len());

        for itervar in itervars {
            let path = self.batch_partition_path(name, itervar);
            debug!(task = name, itervar = %itervar, path = %path.display(), "loading partition");
            let mut part = codec::read_table(&path)?;

            if let Some(column) = itervar_column {
                part = part.with_constant_column(column, Value::Text(itervar.to_string()));
            }
            if let Some(transform) = transform {
                part = transform(part);
            }
            parts.push(part);
        }

        Ok(Table::concat(parts))
    }

    /// [`prepare_batch`](Self::prepare_batch) then [`load_batch`](Self::load_batch).
    pub fn select_batch<I: Display>(
        &self,
        sql_template: &str,
        itervars: &[I],
        name: &str,
        itervar_column: Option<&str>,
    ) -> ImpselectResult<Table> {
        self.prepare_batch(sql_template, itervars, name)?;
        self.load_batch(itervars, name, itervar_column, None)
    }

    /// Delete the cached partitions of batch `name` for `itervars`.
    /// Returns how many existed.
    pub fn evict_batch<I: Display>(&self, itervars: &[I], name: &str) -> ImpselectResult<usize> {
        let mut removed = 0;
        for itervar in itervars {
            if remove_if_exists(&self.batch_partition_path(name, itervar))? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
