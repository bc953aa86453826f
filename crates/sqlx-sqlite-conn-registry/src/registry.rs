//! Append-only registry of native connection handles.

use std::ptr::NonNull;

use libsqlite3_sys::sqlite3;
use parking_lot::Mutex;
use tracing::trace;

/// Identity of one native SQLite connection.
///
/// Two ids are equal when they name the same `sqlite3*`. The pointer is never
/// dereferenced by this crate except through SQLite's own status call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(NonNull<sqlite3>);

// SAFETY: The pointer is an opaque identity. The only dereference happens
// inside `sqlite3_db_status`, which takes the connection mutex when the
// connection was opened with SQLITE_OPEN_FULLMUTEX.
unsafe impl Send for ConnectionId {}
unsafe impl Sync for ConnectionId {}

impl ConnectionId {
   /// Wraps a raw handle, usually obtained from `LockedSqliteHandle::as_raw_handle`.
   pub fn new(db: NonNull<sqlite3>) -> Self {
      Self(db)
   }

   /// Returns the raw `sqlite3*` pointer.
   pub fn as_ptr(self) -> *mut sqlite3 {
      self.0.as_ptr()
   }
}

/// Concurrently appended set of every connection opened during a run.
///
/// `register` is called from many tasks at once while instances are being
/// provisioned, so all mutation goes through one mutex. Entries are never
/// removed: the size of the registry is the number of engine-level opens.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
   conns: Mutex<Vec<ConnectionId>>,
}

impl ConnectionRegistry {
   pub fn new() -> Self {
      Self::default()
   }

   /// Records a newly opened connection.
   pub fn register(&self, id: ConnectionId) {
      let mut conns = self.conns.lock();
      conns.push(id);
      trace!(conn = ?id.as_ptr(), total = conns.len(), "Registered connection");
   }

   /// Returns a copy of the ids registered so far.
   pub fn snapshot(&self) -> Vec<ConnectionId> {
      self.conns.lock().clone()
   }

   pub fn len(&self) -> usize {
      self.conns.lock().len()
   }

   pub fn is_empty(&self) -> bool {
      self.conns.lock().is_empty()
   }
}
