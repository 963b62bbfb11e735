//! Remote SQL engine boundary.
//!
//! The runner never talks to a database directly. It goes through a
//! [`Connector`], which opens one [`Connection`] per query. Connections are
//! wrapped in a [`ScopedConnection`] so they are closed on every exit path.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::table::Table;

/// Classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// RPC/transport failure talking to the engine. Transient.
    Rpc,
    /// The engine rejected or failed the statement.
    Query,
    /// Connection could not be opened.
    Connect,
    /// Anything else reported by the connector.
    Other,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Rpc => "rpc",
            Self::Query => "query",
            Self::Connect => "connect",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Error reported by a connector or connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Rpc, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Query, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Connect, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Other, message)
    }

    /// Whether the failure is transient and the statement may be re-sent.
    pub fn is_retryable(&self) -> bool {
        self.kind == EngineErrorKind::Rpc
    }
}

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Opaque connection parameters, passed through to the connector untouched.
///
/// Mirrors the `connection` object of the config file, e.g.
/// `{"host": "impala.local", "port": 21050}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionParams(serde_json::Map<String, serde_json::Value>);

impl ConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// String parameter, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for ConnectionParams {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Engine-reported status of a statement that yields no rows (DDL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
}

impl Status {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What the caller wants back from a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Table,
    Status,
}

/// Output of a single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Table(Table),
    Status(Status),
}

impl QueryOutput {
    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(t) => Some(t),
            Self::Status(_) => None,
        }
    }

    pub fn into_status(self) -> Option<Status> {
        match self {
            Self::Status(s) => Some(s),
            Self::Table(_) => None,
        }
    }
}

/// Opens connections to the remote engine.
pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectionParams) -> EngineResult<Box<dyn Connection>>;
}

/// A live engine connection (cursor semantics: execute, then read).
pub trait Connection {
    /// Send a statement.
    fn execute(&mut self, sql: &str) -> EngineResult<()>;

    /// Decode the full result set of the last statement.
    fn fetch_table(&mut self) -> EngineResult<Table>;

    /// Status of the last statement.
    fn status(&mut self) -> EngineResult<Status>;

    fn close(&mut self) -> EngineResult<()>;
}

/// Connection that is closed when dropped.
pub struct ScopedConnection {
    inner: Box<dyn Connection>,
}

impl ScopedConnection {
    pub fn open(connector: &dyn Connector, params: &ConnectionParams) -> EngineResult<Self> {
        let inner = connector.connect(params)?;
        Ok(Self { inner })
    }

    /// Execute `sql` and read the requested kind of result.
    pub fn run(&mut self, sql: &str, kind: ResultKind) -> EngineResult<QueryOutput> {
        self.inner.execute(sql)?;
        match kind {
            ResultKind::Table => self.inner.fetch_table().map(QueryOutput::Table),
            ResultKind::Status => self.inner.status().map(QueryOutput::Status),
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            warn!(error = %e, "failed to close engine connection");
        }
    }
}
