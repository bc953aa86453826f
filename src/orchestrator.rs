//! Fan-out across instances, aggregation and shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use sqlx_sqlite_conn_mgr::StorageHandle;
use sqlx_sqlite_conn_registry::{ConnectionId, ConnectionRegistry, configure_page_cache};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::aggregator::{self, StatusReport};
use crate::config::BenchConfig;
use crate::lifecycle::{CloseBundle, InstanceSpec, provision};
use crate::{Error, Result};

/// Every provisioned instance of one run, and the registry their handles fed.
///
/// The registry is private to the fleet: every connection in it was opened by
/// one of the fleet's handles.
#[derive(Debug)]
#[must_use = "dropping a fleet closes its handles without reporting close errors"]
pub struct Fleet {
   registry: Arc<ConnectionRegistry>,
   bundles: Vec<CloseBundle>,
}

impl Fleet {
   pub fn bundles(&self) -> &[CloseBundle] {
      &self.bundles
   }

   /// Every handle in the fleet, across all instances.
   pub fn handles(&self) -> impl Iterator<Item = &StorageHandle> {
      self.bundles.iter().flat_map(CloseBundle::handles)
   }

   /// Connections registered by the open-time hook, in registration order.
   pub fn connections(&self) -> Vec<ConnectionId> {
      self.registry.snapshot()
   }

   pub fn connection_count(&self) -> usize {
      self.registry.len()
   }

   /// Sums the status counters of every registered connection.
   pub async fn aggregate(&self) -> Result<StatusReport> {
      aggregator::aggregate(self).await
   }

   /// Closes every bundle, attempting all of them even after a failure.
   pub async fn close(self) -> Result<()> {
      let mut failures = Vec::new();
      for bundle in self.bundles {
         let id = bundle.id();
         let bundle_failures = bundle.close_all().await;
         for e in &bundle_failures {
            error!(instance = %id, error = %e, "Teardown error");
         }
         failures.extend(bundle_failures);
      }
      Error::from_close_failures(failures)
   }
}

/// Provisions `config.instances` instances concurrently.
///
/// Bundles come back through the join itself. If any instance fails the
/// remaining tasks are aborted, every bundle already provisioned is closed and
/// that error is returned.
pub async fn provision_fleet(config: &BenchConfig) -> Result<Fleet> {
   config.validate()?;

   let registry = Arc::new(ConnectionRegistry::new());
   let spec = Arc::new(InstanceSpec::from(config));
   let mut tasks = JoinSet::new();

   for _ in 0..config.instances {
      let spec = Arc::clone(&spec);
      let registry = Arc::clone(&registry);
      tasks.spawn(async move { provision(&spec, registry).await });
   }

   let mut bundles = Vec::with_capacity(config.instances);
   while let Some(joined) = tasks.join_next().await {
      let result = joined
         .map_err(|source| Error::Join {
            task: "instance",
            source,
         })
         .and_then(|provisioned| provisioned);

      match result {
         Ok(bundle) => bundles.push(bundle),
         Err(e) => {
            error!(error = %e, "Instance provisioning failed, aborting run");
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
               if let Ok(Ok(bundle)) = joined {
                  bundles.push(bundle);
               }
            }
            discard(bundles).await;
            return Err(e);
         }
      }
   }

   Ok(Fleet { registry, bundles })
}

/// Closes bundles of a run that is being abandoned, logging any failure.
async fn discard(bundles: Vec<CloseBundle>) {
   for bundle in bundles {
      let id = bundle.id();
      for e in bundle.close_all().await {
         warn!(instance = %id, error = %e, "Teardown error while aborting run");
      }
   }
}

/// Runs the whole harness.
///
/// Configures the optional page cache, provisions the fleet, aggregates the
/// status counters once and hands the report to `on_report`. It then waits
/// for `shutdown` and tears the fleet down.
pub async fn run<R, F>(config: &BenchConfig, on_report: R, shutdown: F) -> Result<StatusReport>
where
   R: FnOnce(&StatusReport),
   F: Future<Output = Result<()>>,
{
   config.validate()?;

   if let Some(bytes) = config.page_cache_bytes {
      configure_page_cache(bytes)?;
   }

   let started = Instant::now();
   let fleet = provision_fleet(config).await?;
   info!(
      instances = fleet.bundles().len(),
      connections = fleet.connection_count(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "Provisioning complete"
   );

   let report = fleet.aggregate().await?;
   on_report(&report);

   info!("Waiting for shutdown signal");
   let signalled = shutdown.await;

   let closed = fleet.close().await;
   signalled?;
   closed?;

   info!("Shutdown complete");
   Ok(report)
}

/// Resolves on Ctrl-C, or on SIGTERM on unix.
pub async fn shutdown_signal() -> Result<()> {
   #[cfg(unix)]
   {
      use tokio::signal::unix::{SignalKind, signal};

      let mut terminate = signal(SignalKind::terminate()).map_err(Error::Signal)?;
      tokio::select! {
         result = tokio::signal::ctrl_c() => result.map_err(Error::Signal)?,
         _ = terminate.recv() => {}
      }
   }

   #[cfg(not(unix))]
   tokio::signal::ctrl_c().await.map_err(Error::Signal)?;

   info!("Received shutdown signal");
   Ok(())
}
