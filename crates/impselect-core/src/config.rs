//! Runner configuration.
//!
//! Resolved once, when a runner is built, with this priority:
//! 1. Explicit [`RunnerOptions`]
//! 2. `.impselect.txt` in the current directory
//! 3. `.impselect.txt` in the home directory
//! 4. Built-in defaults
//!
//! # Config file
//!
//! ```json
//! {
//!   "connection": {"host": "impala.local", "port": 21050},
//!   "tmpdir": "/data/impselect",
//!   "verbose": 1,
//!   "try_except": {"timeout": 10, "count": 10}
//! }
//! ```
//!
//! Every key is optional. `try_except` may also be `false` to disable retries.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::ConnectionParams;
use crate::error::{ImpselectError, ImpselectResult};

/// File name looked up in the current and home directories.
pub const CONFIG_FILE_NAME: &str = ".impselect.txt";

/// Default verbosity (info messages on).
pub const DEFAULT_VERBOSE: i64 = 1;

/// Retry policy for transient engine failures during batch preparation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Seconds to wait between attempts; fractions allowed.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Total attempts, including the first.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_timeout() -> f64 {
    10.0
}

fn default_count() -> u32 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            count: default_count(),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: f64, count: u32) -> Self {
        Self { timeout, count }
    }

    /// Wait between attempts. Zero for a timeout that failed validation.
    pub fn backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or_default()
    }

    /// The timeout must be a finite, non-negative number of seconds.
    pub fn validate(&self) -> ImpselectResult<()> {
        if self.timeout.is_finite() && self.timeout >= 0.0 {
            Ok(())
        } else {
            Err(ImpselectError::config(format!(
                "try_except timeout must be a non-negative number of seconds, got {}",
                self.timeout
            )))
        }
    }

    /// Attempts actually made; a zero count still runs the query once.
    pub fn attempts(&self) -> u32 {
        self.count.max(1)
    }
}

/// The `try_except` value: a policy object, or a plain on/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrySetting {
    Policy(RetryPolicy),
    Enabled(bool),
}

impl RetrySetting {
    /// Effective policy; `true` means the default policy, `false` none.
    pub fn policy(self) -> Option<RetryPolicy> {
        match self {
            Self::Policy(p) => Some(p),
            Self::Enabled(true) => Some(RetryPolicy::default()),
            Self::Enabled(false) => None,
        }
    }
}

/// Contents of one config file. All keys optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub connection: Option<ConnectionParams>,

    #[serde(default)]
    pub tmpdir: Option<PathBuf>,

    #[serde(default)]
    pub verbose: Option<i64>,

    #[serde(default)]
    pub try_except: Option<RetrySetting>,
}

impl FileConfig {
    /// Load a config file. A missing file yields `None`.
    pub fn load(path: &Path) -> ImpselectResult<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(None);
            }
            Err(e) => {
                return Err(ImpselectError::config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let config = serde_json::from_str(&content).map_err(|e| {
            ImpselectError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(Some(config))
    }
}

/// Candidate config files, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    paths: Vec<PathBuf>,
}

impl ConfigSources {
    /// `./.impselect.txt`, then `~/.impselect.txt`.
    pub fn discover() -> Self {
        let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAME)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }
        Self { paths }
    }

    /// Explicit list of files, highest priority first.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// No config files at all; only explicit options and defaults apply.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Load every existing file, preserving priority order.
    pub fn load(&self) -> ImpselectResult<Vec<FileConfig>> {
        let mut layers = Vec::new();
        for path in &self.paths {
            if let Some(layer) = FileConfig::load(path)? {
                layers.push(layer);
            }
        }
        Ok(layers)
    }
}

/// Values passed explicitly when building a runner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnerOptions {
    pub connection: Option<ConnectionParams>,

    /// Cache directory, used as-is (no runner name appended).
    pub dir: Option<PathBuf>,

    pub verbose: Option<i64>,

    pub retry: Option<RetrySetting>,
}

impl RunnerOptions {
    pub fn with_connection(mut self, connection: ConnectionParams) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_verbose(mut self, verbose: i64) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(RetrySetting::Policy(policy));
        self
    }

    /// Run batch queries once, never retrying.
    pub fn without_retry(mut self) -> Self {
        self.retry = Some(RetrySetting::Enabled(false));
        self
    }
}

/// Fully resolved configuration held by a runner.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub connection: ConnectionParams,
    pub dir: PathBuf,
    pub verbose: i64,
    pub retry: Option<RetryPolicy>,
}

/// Fold explicit options, file layers (highest priority first) and defaults.
///
/// Fails when no source provides connection parameters.
pub fn resolve_config(
    name: &str,
    options: &RunnerOptions,
    layers: &[FileConfig],
) -> ImpselectResult<EffectiveConfig> {
    let connection = options
        .connection
        .clone()
        .or_else(|| layers.iter().find_map(|l| l.connection.clone()))
        .ok_or_else(|| ImpselectError::config("connection is not defined"))?;

    let dir = match &options.dir {
        Some(dir) => dir.clone(),
        None => layers
            .iter()
            .find_map(|l| l.tmpdir.as_ref())
            .map(|tmpdir| tmpdir.join(name))
            .unwrap_or_else(|| default_cache_root().join(name)),
    };

    let verbose = options
        .verbose
        .or_else(|| layers.iter().find_map(|l| l.verbose))
        .unwrap_or(DEFAULT_VERBOSE);

    let retry = options
        .retry
        .or_else(|| layers.iter().find_map(|l| l.try_except))
        .map_or(Some(RetryPolicy::default()), RetrySetting::policy);
    if let Some(policy) = &retry {
        policy.validate()?;
    }

    Ok(EffectiveConfig {
        connection,
        dir,
        verbose,
        retry,
    })
}

/// `<system temp dir>/impselect`.
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("impselect")
}

/// Create `dir` and its parents. An existing directory is fine.
pub fn ensure_dir(dir: &Path) -> ImpselectResult<()> {
    fs::create_dir_all(dir).map_err(|source| ImpselectError::Directory {
        path: dir.to_path_buf(),
        source,
    })
}
