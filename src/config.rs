//! Harness configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx_sqlite_conn_mgr::HandleConfig;
use sqlx_sqlite_workload::WriteWorkload;

use crate::{Error, Result};

/// Configuration for one harness run
///
/// Values are layered: [`Default`], then an optional TOML file, then command
/// line flags.
///
/// # Examples
///
/// ```
/// use sqlite_fanout_bench::BenchConfig;
///
/// let config = BenchConfig::from_toml_str(
///     r#"
///     instances = 2
///     write_rows = 100
///     readers = 3
///
///     [handle]
///     journal_mode = "wal"
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.instances, 2);
/// assert_eq!(config.batch_size, 100);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
   /// Number of independent databases provisioned in parallel
   ///
   /// Default: 10
   pub instances: usize,

   /// Rows inserted into each database
   ///
   /// Default: 10000
   pub write_rows: u64,

   /// Concurrent read-only handles scanning each database
   ///
   /// Default: 10
   pub readers: usize,

   /// Rows committed per write transaction
   ///
   /// Default: 100
   pub batch_size: u64,

   /// Shortest random text value (inclusive)
   ///
   /// Default: 10
   pub min_len: usize,

   /// Longest random text value (exclusive)
   ///
   /// Default: 1000
   pub max_len: usize,

   /// Directory the per-instance temporary directories are created in
   ///
   /// Default: the system temp directory
   pub temp_root: Option<PathBuf>,

   /// Bytes handed to SQLite as a preallocated page cache before any connection opens
   ///
   /// Default: none (SQLite allocates pages from the heap)
   pub page_cache_bytes: Option<usize>,

   /// Settings applied to every handle
   pub handle: HandleConfig,
}

impl Default for BenchConfig {
   fn default() -> Self {
      Self {
         instances: 10,
         write_rows: 10_000,
         readers: 10,
         batch_size: 100,
         min_len: 10,
         max_len: 1000,
         temp_root: None,
         page_cache_bytes: None,
         handle: HandleConfig::default(),
      }
   }
}

impl BenchConfig {
   pub fn from_toml_str(s: &str) -> Result<Self> {
      Ok(toml::from_str(s)?)
   }

   pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
      let contents = std::fs::read_to_string(path)?;
      Self::from_toml_str(&contents)
   }

   /// The write workload each instance runs.
   pub fn workload(&self) -> WriteWorkload {
      WriteWorkload {
         total_rows: self.write_rows,
         batch_size: self.batch_size,
         min_len: self.min_len,
         max_len: self.max_len,
      }
   }

   pub fn validate(&self) -> Result<()> {
      self
         .workload()
         .validate()
         .map_err(|e| Error::Config(e.to_string()))?;

      if self.page_cache_bytes == Some(0) {
         return Err(Error::Config("page_cache_bytes must be greater than zero".into()));
      }

      Ok(())
   }
}
