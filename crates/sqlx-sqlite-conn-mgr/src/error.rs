//! Error types for sqlx-sqlite-conn-mgr

use std::path::PathBuf;

use thiserror::Error;

use crate::handle::OpenMode;

/// Errors that may occur when opening or closing a [`StorageHandle`](crate::StorageHandle)
#[derive(Error, Debug)]
pub enum Error {
   /// The engine refused to open the database file.
   #[error("failed to open {} handle on {}: {}", .mode, .path.display(), .source)]
   Open {
      path: PathBuf,
      mode: OpenMode,
      source: sqlx::Error,
   },

   /// The pool opened without running the open-time hook.
   #[error("open hook did not observe a connection for {}", .path.display())]
   HookNotInvoked { path: PathBuf },

   /// The handle has been closed already.
   #[error("handle for {} has already been closed", .path.display())]
   Closed { path: PathBuf },

   /// The engine reported an error while closing the connection.
   #[error("failed to close handle for {}: {}", .path.display(), .source)]
   Close { path: PathBuf, source: sqlx::Error },
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
