//! Single-connection SQLite handles with an open-time registration hook

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Connection, Pool, Sqlite};
use sqlx_sqlite_conn_registry::{ConnectionId, ConnectionRegistry};
use tracing::{debug, trace};

use crate::config::HandleConfig;
use crate::{Error, Result};

/// Whether a handle may modify the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
   ReadWrite,
   ReadOnly,
}

impl fmt::Display for OpenMode {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         OpenMode::ReadWrite => f.write_str("read-write"),
         OpenMode::ReadOnly => f.write_str("read-only"),
      }
   }
}

/// One open connection to one SQLite database file.
///
/// ## Architecture
///
/// The handle wraps a `Pool<Sqlite>` limited to exactly one connection, with
/// idle timeout and max lifetime disabled. The pool exists only for its
/// `after_connect` hook: the native connection is registered the moment the
/// engine opens it, and it is never silently replaced afterwards.
///
/// A handle is used by one task at a time. Ownership moves into whichever task
/// runs a workload on it and is handed back when the task joins.
#[derive(Debug)]
pub struct StorageHandle {
   /// Single-connection pool (max_connections=1)
   pool: Pool<Sqlite>,

   /// Native connection recorded by the open hook
   connection_id: ConnectionId,

   /// Marks handle as closed so a second close is reported, not retried
   closed: AtomicBool,

   path: PathBuf,
   mode: OpenMode,
}

impl StorageHandle {
   /// Opens a handle on `path` and registers its native connection.
   ///
   /// Read-write handles create the file if it is missing. Read-only handles
   /// fail if it does not exist. A failed open registers nothing.
   pub async fn open(
      path: impl AsRef<Path>,
      mode: OpenMode,
      config: &HandleConfig,
      registry: Arc<ConnectionRegistry>,
   ) -> Result<Self> {
      let path = path.as_ref().to_path_buf();

      let options = SqliteConnectOptions::new()
         .filename(&path)
         .busy_timeout(config.busy_timeout)
         .statement_cache_capacity(config.statement_cache_capacity)
         .serialized(true);

      let options = match mode {
         OpenMode::ReadWrite => {
            let options = options
               .create_if_missing(true)
               .journal_mode(config.journal_mode.into());
            match config.max_page_count {
               Some(pages) => options.pragma("max_page_count", pages.to_string()),
               None => options,
            }
         }
         OpenMode::ReadOnly => options.read_only(true),
      };

      let opened: Arc<OnceLock<ConnectionId>> = Arc::new(OnceLock::new());
      let hook_opened = Arc::clone(&opened);

      // connect_with opens the first connection eagerly, so the hook has run
      // by the time it returns.
      let pool = SqlitePoolOptions::new()
         .max_connections(1)
         .min_connections(0)
         .idle_timeout(None)
         .max_lifetime(None)
         .test_before_acquire(false)
         .after_connect(move |conn, _meta| {
            let registry = Arc::clone(&registry);
            let opened = Arc::clone(&hook_opened);
            Box::pin(async move {
               let mut handle = conn.lock_handle().await?;
               let id = ConnectionId::new(handle.as_raw_handle());
               drop(handle);

               registry.register(id);
               let _ = opened.set(id);
               Ok::<(), sqlx::Error>(())
            })
         })
         .connect_with(options)
         .await
         .map_err(|source| Error::Open {
            path: path.clone(),
            mode,
            source,
         })?;

      let Some(connection_id) = opened.get().copied() else {
         pool.close().await;
         return Err(Error::HookNotInvoked { path });
      };

      debug!(path = %path.display(), %mode, conn = ?connection_id.as_ptr(), "Opened storage handle");

      Ok(Self {
         pool,
         connection_id,
         closed: AtomicBool::new(false),
         path,
         mode,
      })
   }

   /// Get a reference to the connection pool backing this handle.
   pub fn pool(&self) -> &Pool<Sqlite> {
      &self.pool
   }

   /// Native connection registered when this handle was opened.
   pub fn connection_id(&self) -> ConnectionId {
      self.connection_id
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   pub fn mode(&self) -> OpenMode {
      self.mode
   }

   pub fn is_closed(&self) -> bool {
      self.closed.load(Ordering::Acquire)
   }

   /// Closes the native connection and the pool around it.
   ///
   /// The connection is detached and closed explicitly so the engine's close
   /// error is reported instead of being swallowed by the pool. Calling this a
   /// second time returns [`Error::Closed`].
   pub async fn close(&self) -> Result<()> {
      if self.closed.swap(true, Ordering::AcqRel) {
         return Err(Error::Closed {
            path: self.path.clone(),
         });
      }

      let result = match self.pool.acquire().await {
         Ok(conn) => conn.detach().close().await,
         Err(e) => Err(e),
      };

      self.pool.close().await;
      trace!(path = %self.path.display(), mode = %self.mode, "Closed storage handle");

      result.map_err(|source| Error::Close {
         path: self.path.clone(),
         source,
      })
   }
}
