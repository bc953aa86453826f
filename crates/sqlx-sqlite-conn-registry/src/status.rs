//! Per-connection status counters (`sqlite3_db_status`).

use std::fmt;
use std::os::raw::c_int;

use libsqlite3_sys as ffi;
use serde::Serialize;

use crate::registry::ConnectionId;
use crate::{Error, Result};

/// The connection status counters the harness aggregates.
///
/// Each maps onto one `SQLITE_DBSTATUS_*` verb. [`StatusKind::ALL`] is the
/// enumeration order used everywhere a report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
   /// Heap memory used by the pager caches.
   CacheUsed,
   /// Lookaside slots currently checked out.
   LookasideUsed,
   /// Heap memory used to store schemas.
   SchemaUsed,
   /// Heap and lookaside memory used by prepared statements.
   StmtUsed,
   /// Dirty pages written to disk mid-transaction because the cache was full.
   CacheSpill,
}

impl StatusKind {
   pub const ALL: [StatusKind; 5] = [
      StatusKind::CacheUsed,
      StatusKind::LookasideUsed,
      StatusKind::SchemaUsed,
      StatusKind::StmtUsed,
      StatusKind::CacheSpill,
   ];

   pub fn as_str(self) -> &'static str {
      match self {
         StatusKind::CacheUsed => "CACHE_USED",
         StatusKind::LookasideUsed => "LOOKASIDE_USED",
         StatusKind::SchemaUsed => "SCHEMA_USED",
         StatusKind::StmtUsed => "STMT_USED",
         StatusKind::CacheSpill => "CACHE_SPILL",
      }
   }

   fn op(self) -> c_int {
      match self {
         StatusKind::CacheUsed => ffi::SQLITE_DBSTATUS_CACHE_USED,
         StatusKind::LookasideUsed => ffi::SQLITE_DBSTATUS_LOOKASIDE_USED,
         StatusKind::SchemaUsed => ffi::SQLITE_DBSTATUS_SCHEMA_USED,
         StatusKind::StmtUsed => ffi::SQLITE_DBSTATUS_STMT_USED,
         StatusKind::CacheSpill => ffi::SQLITE_DBSTATUS_CACHE_SPILL,
      }
   }
}

impl fmt::Display for StatusKind {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// One reading of a status counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSample {
   pub current: i64,
   pub highwater: i64,
}

impl ConnectionId {
   /// Reads one status counter from this connection without resetting it.
   ///
   /// # Safety
   ///
   /// The connection must still be open. Calling this after the connection
   /// was closed reads freed memory.
   pub unsafe fn status(self, kind: StatusKind) -> Result<StatusSample> {
      let mut current: c_int = 0;
      let mut highwater: c_int = 0;

      // SAFETY: the caller guarantees the handle is live; the out pointers are
      // valid locals for the duration of the call.
      let rc = unsafe {
         ffi::sqlite3_db_status(self.as_ptr(), kind.op(), &mut current, &mut highwater, 0)
      };

      if rc != ffi::SQLITE_OK {
         return Err(Error::Status { kind, code: rc });
      }

      Ok(StatusSample {
         current: i64::from(current),
         highwater: i64::from(highwater),
      })
   }
}

/// Process-wide heap usage reported by SQLite's allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineMemory {
   pub used: i64,
   pub highwater: i64,
}

/// Reads SQLite's global memory counters without resetting the high-water mark.
pub fn memory_usage() -> EngineMemory {
   // SAFETY: both calls only read global allocator statistics.
   unsafe {
      EngineMemory {
         used: ffi::sqlite3_memory_used(),
         highwater: ffi::sqlite3_memory_highwater(0),
      }
   }
}
