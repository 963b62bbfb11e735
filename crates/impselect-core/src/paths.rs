//! Cache path derivation.
//!
//! ```text
//! <cache dir>/
//!   orders.csv.gz              # task "orders"
//!   per_day_2020-01-01.csv.gz  # batch "per_day", itervar "2020-01-01"
//! ```
//!
//! Only spaces and colons are rewritten; other path-unsafe characters in
//! task names are the caller's problem.

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Suffix of every cache file.
pub const CACHE_FILE_SUFFIX: &str = ".csv.gz";

/// Replace spaces and colons with underscores.
pub fn sanitize(name: &str) -> String {
    name.replace(|c: char| c == ' ' || c == ':', "_")
}

/// Cache file of a single task.
pub fn task_path(cache_dir: &Path, name: &str) -> PathBuf {
    cache_dir.join(format!("{}{}", sanitize(name), CACHE_FILE_SUFFIX))
}

/// Cache file of one batch partition.
pub fn batch_partition_path(cache_dir: &Path, name: &str, itervar: &dyn Display) -> PathBuf {
    let stem = format!("{}_{}", name, itervar);
    cache_dir.join(format!("{}{}", sanitize(&stem), CACHE_FILE_SUFFIX))
}
