//! # sqlx-sqlite-conn-registry
//!
//! Tracks every native SQLite connection a harness opens through sqlx and
//! reads the engine's per-connection memory counters back out of them.
//!
//! ## Core Types
//!
//! - **[`ConnectionRegistry`]**: Mutex-guarded, append-only set of [`ConnectionId`]s
//! - **[`ConnectionId`]**: Identity of one open `sqlite3*` connection
//! - **[`StatusKind`]**: The `SQLITE_DBSTATUS_*` counters the harness aggregates
//! - **[`Error`]**: Error type for status and configuration calls
//!
//! ## Architecture
//!
//! The registry itself knows nothing about sqlx. Connections are fed into it by
//! an open-time hook (see `sqlx-sqlite-conn-mgr`), which locks the freshly
//! opened connection, extracts the raw handle and calls
//! [`ConnectionRegistry::register`]. Nothing is ever removed, so the registry
//! only stays meaningful while the connections it names are still open.
//!
//! [`configure_page_cache`] is an optional process-wide tuning step and must run
//! before the first connection is opened.

mod error;
mod page_cache;
mod registry;
mod status;

pub use error::{Error, Result};
pub use page_cache::{PageCacheLayout, configure_page_cache};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use status::{EngineMemory, StatusKind, StatusSample, memory_usage};
