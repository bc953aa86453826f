//! Error types for the sqlx-sqlite-conn-registry crate.

use std::os::raw::c_int;

use crate::status::StatusKind;

/// Errors that can occur while introspecting or configuring SQLite.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// `sqlite3_db_status` returned something other than `SQLITE_OK`.
   ///
   /// This usually means the connection id is stale or was never a live connection.
   #[error("sqlite: db status {kind}: return code {code}")]
   Status { kind: StatusKind, code: c_int },

   /// `sqlite3_config` rejected an option.
   #[error("sqlite: failed to configure {option}: {message} (code {code})")]
   Config {
      option: &'static str,
      code: c_int,
      message: String,
   },

   /// SQLite was compiled with `SQLITE_THREADSAFE=0`.
   #[error("sqlite: thread safety configuration error")]
   NotThreadSafe,

   /// Requested page cache cannot hold a single page slot.
   #[error("page cache of {bytes} bytes is smaller than one {slot_size} byte slot")]
   PageCacheTooSmall { bytes: usize, slot_size: usize },

   /// Requested page cache has more slots than SQLite can address.
   #[error("page cache of {bytes} bytes exceeds what SQLite can address")]
   PageCacheTooLarge { bytes: usize },
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
