//! Configuration for SQLite storage handles

use std::time::Duration;

use serde::Deserialize;
use sqlx::sqlite::SqliteJournalMode;

/// Configuration applied to every [`StorageHandle`](crate::StorageHandle)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_mgr::{HandleConfig, JournalMode};
///
/// // Use defaults
/// let config = HandleConfig::default();
///
/// // Override just one field
/// let config = HandleConfig {
///     journal_mode: JournalMode::Wal,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
   /// How long a connection waits on a locked database before failing
   ///
   /// Default: 5 seconds
   #[serde(with = "millis", rename = "busy_timeout_ms")]
   pub busy_timeout: Duration,

   /// Journal mode set on read-write handles
   ///
   /// Read-only handles inherit whatever the writer configured.
   ///
   /// Default: [`JournalMode::Delete`]
   pub journal_mode: JournalMode,

   /// Number of prepared statements each connection keeps cached
   ///
   /// Default: 100
   pub statement_cache_capacity: usize,

   /// Upper bound on the database size, in pages, set on read-write handles
   ///
   /// Writes that would grow the file past it fail with `SQLITE_FULL`.
   ///
   /// Default: unlimited
   pub max_page_count: Option<u32>,
}

impl Default for HandleConfig {
   fn default() -> Self {
      Self {
         busy_timeout: Duration::from_secs(5),
         journal_mode: JournalMode::Delete,
         statement_cache_capacity: 100,
         max_page_count: None,
      }
   }
}

/// SQLite journal modes a writer may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
   #[default]
   Delete,
   Truncate,
   Persist,
   Memory,
   Wal,
   Off,
}

impl From<JournalMode> for SqliteJournalMode {
   fn from(mode: JournalMode) -> Self {
      match mode {
         JournalMode::Delete => SqliteJournalMode::Delete,
         JournalMode::Truncate => SqliteJournalMode::Truncate,
         JournalMode::Persist => SqliteJournalMode::Persist,
         JournalMode::Memory => SqliteJournalMode::Memory,
         JournalMode::Wal => SqliteJournalMode::Wal,
         JournalMode::Off => SqliteJournalMode::Off,
      }
   }
}

mod millis {
   use std::time::Duration;

   use serde::{Deserialize, Deserializer};

   pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
      u64::deserialize(deserializer).map(Duration::from_millis)
   }
}
