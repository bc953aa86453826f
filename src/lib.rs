//! # sqlite-fanout-bench
//!
//! A concurrent load and instrumentation harness for SQLite.
//!
//! ## Phases
//!
//! 1. **Provision**: [`provision_fleet`] runs one [`provision`] task per instance.
//!    Each task creates a private database, populates it through one writer,
//!    then scans it concurrently through `readers` read-only handles.
//! 2. **Aggregate**: [`Fleet::aggregate`] sums the engine's per-connection
//!    memory counters over every connection opened during provisioning.
//! 3. **Teardown**: after the shutdown signal, [`Fleet::close`] closes every
//!    handle, reader handles before each writer.
//!
//! [`run`] strings the three together and is what the binary calls.

mod aggregator;
mod config;
mod error;
mod lifecycle;
mod orchestrator;

pub use aggregator::StatusReport;
pub use config::BenchConfig;
pub use error::{Error, Result};
pub use lifecycle::{CloseBundle, InstanceSpec, provision};
pub use orchestrator::{Fleet, provision_fleet, run, shutdown_signal};

pub use sqlx_sqlite_conn_mgr::{HandleConfig, JournalMode, OpenMode, StorageHandle};
pub use sqlx_sqlite_conn_registry::{ConnectionId, ConnectionRegistry, EngineMemory, StatusKind};
pub use sqlx_sqlite_workload::WriteWorkload;
