//! Scripted in-memory engine shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use impselect_core::{
    Connection, ConnectionParams, Connector, EngineError, EngineResult, QueryRunner,
    RetryPolicy, RunnerOptions, Sleeper, Status, Table, Value,
};
use tempfile::TempDir;

#[derive(Default)]
pub struct EngineState {
    /// Every statement sent, in order.
    pub log: Vec<String>,
    /// Errors returned by the next statements, one each, before normal handling.
    pub failures: VecDeque<EngineError>,
    /// Canned result sets by exact SQL text.
    pub responses: HashMap<String, Table>,
    /// Tables created with CREATE TABLE ... AS.
    pub tables: HashMap<String, Table>,
    pub opened: usize,
    pub closed: usize,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, sql: &str, table: Table) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(sql.to_string(), table);
    }

    pub fn fail_next(&self, err: EngineError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn statements(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    pub fn connections(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.opened, state.closed)
    }
}

impl Connector for FakeEngine {
    fn connect(&self, _params: &ConnectionParams) -> EngineResult<Box<dyn Connection>> {
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
            last: None,
        }))
    }
}

enum Outcome {
    Rows(Table),
    Done(Status),
}

struct FakeConnection {
    state: Arc<Mutex<EngineState>>,
    last: Option<Outcome>,
}

impl Connection for FakeConnection {
    fn execute(&mut self, sql: &str) -> EngineResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.log.push(sql.to_string());
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let outcome = if let Some(table) = state.responses.get(sql) {
            Outcome::Rows(table.clone())
        } else if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let (name, inner) = rest
                .split_once(" AS (")
                .ok_or_else(|| EngineError::query("bad CREATE TABLE"))?;
            let inner = inner.strip_suffix(')').unwrap_or(inner);
            let table = evaluate_select(&state.responses, inner)?;
            state.tables.insert(name.to_string(), table);
            Outcome::Done(Status::new("Inserted 1 row(s)"))
        } else if let Some(rest) = sql.strip_prefix("DROP TABLE IF EXISTS ") {
            let name = rest.strip_suffix(" PURGE").unwrap_or(rest);
            state.tables.remove(name);
            Outcome::Done(Status::new("Table has been dropped."))
        } else if let Some(name) = sql.strip_prefix("DESCRIBE ") {
            let table = state
                .tables
                .get(name)
                .ok_or_else(|| EngineError::query(format!("table not found: {name}")))?;
            let rows = table
                .columns()
                .iter()
                .map(|c| vec![Value::from(c.as_str()), Value::from("string")])
                .collect();
            Outcome::Rows(Table::from_rows(vec!["name".into(), "type".into()], rows).unwrap())
        } else if let Some(name) = sql.strip_prefix("SELECT * FROM ") {
            match state.tables.get(name) {
                Some(t) => Outcome::Rows(t.clone()),
                None => Outcome::Rows(evaluate_select(&state.responses, sql)?),
            }
        } else {
            Outcome::Rows(evaluate_select(&state.responses, sql)?)
        };

        self.last = Some(outcome);
        Ok(())
    }

    fn fetch_table(&mut self) -> EngineResult<Table> {
        match self.last.take() {
            Some(Outcome::Rows(t)) => Ok(t),
            Some(Outcome::Done(_)) => Ok(Table::default()),
            None => Err(EngineError::other("no statement executed")),
        }
    }

    fn status(&mut self) -> EngineResult<Status> {
        match self.last.take() {
            Some(Outcome::Done(s)) => Ok(s),
            Some(Outcome::Rows(_)) => Ok(Status::new("OK")),
            None => Err(EngineError::other("no statement executed")),
        }
    }

    fn close(&mut self) -> EngineResult<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// `SELECT <literal>` yields one row with a `value` column; canned
/// responses win.
fn evaluate_select(responses: &HashMap<String, Table>, sql: &str) -> EngineResult<Table> {
    if let Some(t) = responses.get(sql) {
        return Ok(t.clone());
    }
    let expr = sql
        .strip_prefix("SELECT ")
        .ok_or_else(|| EngineError::query(format!("unsupported statement: {sql}")))?;
    Ok(Table::from_rows(vec!["value".into()], vec![vec![Value::infer(expr)]]).unwrap())
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }

    pub fn count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub struct Harness {
    pub engine: FakeEngine,
    pub sleeper: Arc<RecordingSleeper>,
    pub runner: QueryRunner,
    pub dir: TempDir,
}

/// Route runner logs to the test output; `RUST_LOG=debug` shows statements.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn harness(retry: Option<RetryPolicy>) -> Harness {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::new();
    let sleeper = Arc::new(RecordingSleeper::default());

    let mut options = RunnerOptions::default()
        .with_connection(ConnectionParams::new().with("host", "fake"))
        .with_dir(dir.path().join("cache"));
    options = match retry {
        Some(policy) => options.with_retry(policy),
        None => options.without_retry(),
    };

    let runner = QueryRunner::with_sources(
        "test",
        Arc::new(engine.clone()),
        options,
        &impselect_core::ConfigSources::none(),
    )
    .unwrap()
    .with_sleeper(sleeper.clone());

    Harness {
        engine,
        sleeper,
        runner,
        dir,
    }
}

pub fn int_table(column: &str, values: &[i64]) -> Table {
    Table::from_rows(
        vec![column.to_string()],
        values.iter().map(|v| vec![Value::Int(*v)]).collect(),
    )
    .unwrap()
}
