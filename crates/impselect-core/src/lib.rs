//! Cached, resumable batch selection over a remote SQL engine.
//!
//! This crate provides:
//!
//! - A [`QueryRunner`] that executes SQL through a pluggable [`Connector`]
//! - Result caching as gzip-compressed CSV files keyed by task name
//! - Batch selection: one parameterized query per iteration value, each
//!   partition cached on its own, then concatenated in order
//! - Bounded retry with a fixed backoff around transient (RPC) failures
//! - Layered configuration from explicit options and `.impselect.txt` files
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use impselect_core::{Connector, QueryRunner, RunnerOptions};
//!
//! # fn example(connector: Arc<dyn Connector>) -> impselect_core::ImpselectResult<()> {
//! let runner = QueryRunner::new("daily", connector, RunnerOptions::default())?;
//!
//! // Runs once; later calls read `<cache dir>/orders.csv.gz`.
//! let orders = runner.select("SELECT * FROM orders", Some("orders"), None)?;
//! println!("{} orders", orders.num_rows());
//!
//! // One query per day, tagged with a `dt` column.
//! let days = ["2020-01-01", "2020-01-02"];
//! let visits = runner.select_batch(
//!     "SELECT count(*) AS visits FROM visits WHERE dt = '{itervar}'",
//!     &days,
//!     "visits",
//!     Some("dt"),
//! )?;
//! # let _ = visits;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Key | Description | Default |
//! |-----|-------------|---------|
//! | `connection` | Engine connection parameters | required |
//! | `tmpdir` | Cache root; the runner name is appended | system temp dir + `impselect` |
//! | `verbose` | Values below `1` silence info messages | `1` |
//! | `try_except` | `{"timeout": secs, "count": attempts}` or `false` | `{"timeout": 10, "count": 10}` |
//!
//! # Concurrency
//!
//! Everything is synchronous and sequential. Runners sharing a cache
//! directory are not coordinated.

pub mod batch;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod retry;
pub mod runner;
pub mod table;
pub mod template;

// Re-export main types
pub use batch::{PrepareReport, Transform};
pub use config::{
    ConfigSources, EffectiveConfig, FileConfig, RetryPolicy, RetrySetting, RunnerOptions,
    CONFIG_FILE_NAME,
};
pub use engine::{
    Connection, ConnectionParams, Connector, EngineError, EngineErrorKind, EngineResult,
    QueryOutput, ResultKind, ScopedConnection, Status,
};
pub use error::{ImpselectError, ImpselectResult};
pub use paths::{batch_partition_path, sanitize, task_path, CACHE_FILE_SUFFIX};
pub use retry::{Sleeper, ThreadSleeper};
pub use runner::QueryRunner;
pub use table::{Table, Value};
