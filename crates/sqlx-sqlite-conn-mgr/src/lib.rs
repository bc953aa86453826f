//! # sqlx-sqlite-conn-mgr
//!
//! A minimal wrapper around SQLx that opens SQLite handles for a load harness
//! and makes every native connection visible to a
//! [`ConnectionRegistry`](sqlx_sqlite_conn_registry::ConnectionRegistry).
//!
//! ## Core Types
//!
//! - **[`StorageHandle`]**: One open connection to one database file, read-write or read-only
//! - **[`HandleConfig`]**: Connection settings shared by every handle in a run
//! - **[`OpenMode`]**: Whether a handle may write
//! - **[`Error`]**: Error type for open and close
//!
//! ## Architecture
//!
//! - **One connection per handle**: Each handle is a pool capped at a single
//!   connection that never idles out, so the native connection recorded at
//!   open time stays valid until [`StorageHandle::close`]
//! - **Open-time hook**: The pool's `after_connect` callback extracts the raw
//!   `sqlite3*` and registers it, once per engine-level open
//! - **Serialized mode**: Connections are opened with `SQLITE_OPEN_FULLMUTEX` so
//!   status counters can be read from another thread

mod config;
mod error;
mod handle;

// Re-export public types
pub use config::{HandleConfig, JournalMode};
pub use error::{Error, Result};
pub use handle::{OpenMode, StorageHandle};
