//! Runner construction from layered config files.

mod common;

use std::fs;
use std::sync::Arc;

use common::FakeEngine;
use impselect_core::{
    ConfigSources, ConnectionParams, ImpselectError, QueryRunner, RetryPolicy, RunnerOptions,
    CONFIG_FILE_NAME,
};
use tempfile::TempDir;

fn write_config(dir: &TempDir, json: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_local_file_overrides_home_per_key() -> anyhow::Result<()> {
    let local = TempDir::new()?;
    let home = TempDir::new()?;
    let cache_root = TempDir::new()?;

    let local_path = write_config(&local, r#"{"verbose": 0, "try_except": false}"#);
    let home_path = write_config(
        &home,
        &format!(
            r#"{{"connection": {{"host": "home-db"}}, "tmpdir": {}, "verbose": 1,
                "try_except": {{"timeout": 2, "count": 4}}}}"#,
            serde_json::to_string(cache_root.path())?
        ),
    );

    let runner = QueryRunner::with_sources(
        "nightly",
        Arc::new(FakeEngine::new()),
        RunnerOptions::default(),
        &ConfigSources::from_paths(vec![local_path, home_path]),
    )?;

    assert_eq!(runner.name(), "nightly");
    assert_eq!(runner.verbose(), 0);
    assert_eq!(runner.retry_policy(), None);
    assert_eq!(runner.dir(), cache_root.path().join("nightly"));
    assert!(runner.dir().is_dir());
    assert_eq!(
        runner.config().connection.get_str("host"),
        Some("home-db")
    );
    Ok(())
}

#[test]
fn test_home_retry_policy_applies_when_local_is_silent() -> anyhow::Result<()> {
    let home = TempDir::new()?;
    let cache = TempDir::new()?;
    let home_path = write_config(
        &home,
        r#"{"connection": {"host": "db"}, "try_except": {"timeout": 2, "count": 4}}"#,
    );

    let runner = QueryRunner::with_sources(
        "job",
        Arc::new(FakeEngine::new()),
        RunnerOptions::default().with_dir(cache.path()),
        &ConfigSources::from_paths(vec![home_path]),
    )?;

    assert_eq!(runner.retry_policy(), Some(&RetryPolicy::new(2.0, 4)));
    assert_eq!(runner.verbose(), 1);
    assert_eq!(runner.dir(), cache.path());
    Ok(())
}

#[test]
fn test_missing_connection_fails_construction() {
    let cache = TempDir::new().unwrap();
    let result = QueryRunner::with_sources(
        "job",
        Arc::new(FakeEngine::new()),
        RunnerOptions::default().with_dir(cache.path()),
        &ConfigSources::none(),
    );
    assert!(matches!(result, Err(ImpselectError::Config { .. })));
}

#[test]
fn test_uncreatable_cache_dir_fails_construction() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("file");
    fs::write(&blocker, b"x").unwrap();

    let result = QueryRunner::with_sources(
        "job",
        Arc::new(FakeEngine::new()),
        RunnerOptions::default()
            .with_connection(ConnectionParams::new().with("host", "db"))
            .with_dir(blocker.join("cache")),
        &ConfigSources::none(),
    );
    assert!(matches!(result, Err(ImpselectError::Directory { .. })));
}

#[test]
fn test_existing_cache_dir_is_reused() -> anyhow::Result<()> {
    let cache = TempDir::new()?;
    let options = RunnerOptions::default()
        .with_connection(ConnectionParams::new().with("host", "db"))
        .with_dir(cache.path());

    let first = QueryRunner::with_sources(
        "job",
        Arc::new(FakeEngine::new()),
        options.clone(),
        &ConfigSources::none(),
    )?;
    first.save(&common::int_table("id", &[1]), "kept")?;

    let second = QueryRunner::with_sources(
        "job",
        Arc::new(FakeEngine::new()),
        options,
        &ConfigSources::none(),
    )?;
    assert!(second.is_cached("kept"));
    Ok(())
}

#[test]
fn test_fractional_timeout_and_negative_verbose_from_file() -> anyhow::Result<()> {
    let home = TempDir::new()?;
    let cache = TempDir::new()?;
    let path = write_config(
        &home,
        r#"{"connection": {"host": "db"}, "verbose": -1,
            "try_except": {"timeout": 0.5, "count": 3}}"#,
    );

    let runner = QueryRunner::with_sources(
        "job",
        Arc::new(FakeEngine::new()),
        RunnerOptions::default().with_dir(cache.path()),
        &ConfigSources::from_paths(vec![path]),
    )?;

    assert_eq!(runner.retry_policy(), Some(&RetryPolicy::new(0.5, 3)));
    assert_eq!(runner.verbose(), -1);
    Ok(())
}
