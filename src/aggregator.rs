//! Cross-connection status aggregation

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use sqlx_sqlite_conn_mgr::StorageHandle;
use sqlx_sqlite_conn_registry::{ConnectionId, EngineMemory, StatusKind, memory_usage};
use tracing::{debug, trace};

use crate::orchestrator::Fleet;
use crate::{Error, Result};

/// Status counters summed over every registered connection.
///
/// Each [`StatusKind`] appears exactly once, in [`StatusKind::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
   connections: usize,
   totals: IndexMap<StatusKind, i64>,
   memory: EngineMemory,
}

impl StatusReport {
   fn new(connections: usize, memory: EngineMemory) -> Self {
      Self {
         connections,
         totals: StatusKind::ALL.iter().map(|kind| (*kind, 0)).collect(),
         memory,
      }
   }

   /// Number of connections the totals were summed over.
   pub fn connections(&self) -> usize {
      self.connections
   }

   pub fn total(&self, kind: StatusKind) -> i64 {
      self.totals.get(&kind).copied().unwrap_or_default()
   }

   pub fn totals(&self) -> impl Iterator<Item = (StatusKind, i64)> + '_ {
      self.totals.iter().map(|(kind, total)| (*kind, *total))
   }

   /// Process-wide SQLite heap usage at aggregation time.
   pub fn memory(&self) -> EngineMemory {
      self.memory
   }
}

impl fmt::Display for StatusReport {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      writeln!(
         f,
         "sqlite: all connections aggregated statuses ({} connections):",
         self.connections
      )?;
      for (kind, total) in self.totals() {
         writeln!(f, "{kind}: {total}")?;
      }
      write!(
         f,
         "MEMORY_USED: {} (highwater {})",
         self.memory.used, self.memory.highwater
      )
   }
}

/// Reads the current value of every [`StatusKind`] from every registered
/// connection and sums them per kind.
///
/// Each registry entry is resolved to the fleet handle that opened it, and
/// that handle's connection is checked out and locked while it is read, so a
/// handle closed early is reported instead of being read. Any failed read
/// aborts the pass.
pub(crate) async fn aggregate(fleet: &Fleet) -> Result<StatusReport> {
   let owners: HashMap<ConnectionId, &StorageHandle> = fleet
      .handles()
      .map(|handle| (handle.connection_id(), handle))
      .collect();

   let ids = fleet.connections();
   let mut report = StatusReport::new(ids.len(), EngineMemory::default());

   for id in &ids {
      let stale = || Error::StaleConnection {
         conn: format!("{:?}", id.as_ptr()),
      };

      let handle = owners.get(id).ok_or_else(stale)?;
      if handle.is_closed() {
         return Err(stale());
      }

      let mut conn = handle.pool().acquire().await.map_err(|_| stale())?;
      let mut locked = conn.lock_handle().await?;
      if locked.as_raw_handle().as_ptr() != id.as_ptr() {
         return Err(stale());
      }

      for kind in StatusKind::ALL {
         // SAFETY: the connection is checked out of its pool and locked, so it
         // stays open and idle for the duration of the call.
         let sample = unsafe { id.status(kind) }?;
         trace!(conn = ?id.as_ptr(), %kind, current = sample.current, highwater = sample.highwater, "Status sample");

         if let Some(total) = report.totals.get_mut(&kind) {
            *total += sample.current;
         }
      }

      drop(locked);
   }

   report.memory = memory_usage();
   debug!(connections = report.connections, "Aggregated connection status");
   Ok(report)
}
