//! End-to-end tests for provisioning, aggregation and teardown.

use std::cell::Cell;
use std::sync::Arc;

use sqlite_fanout_bench::{
   BenchConfig, ConnectionRegistry, Error, HandleConfig, InstanceSpec, OpenMode, StatusKind, StorageHandle,
   provision, provision_fleet, run,
};
use sqlx_sqlite_workload::{create_schema, scan};
use tempfile::TempDir;

fn config(root: &TempDir, instances: usize, write_rows: u64, readers: usize) -> BenchConfig {
   BenchConfig {
      instances,
      write_rows,
      readers,
      batch_size: 10,
      min_len: 1,
      max_len: 20,
      temp_root: Some(root.path().to_path_buf()),
      ..Default::default()
   }
}

fn instance_dirs(root: &TempDir) -> usize {
   std::fs::read_dir(root.path()).unwrap().count()
}

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_instances_three_readers() {
   let root = TempDir::new().unwrap();
   let fleet = provision_fleet(&config(&root, 2, 100, 3)).await.unwrap();

   assert_eq!(fleet.bundles().len(), 2);
   for bundle in fleet.bundles() {
      assert_eq!(bundle.handle_count(), 4);
      assert_eq!(bundle.readers().len(), 3);
      assert_eq!(bundle.rows(), 100);
      assert_eq!(bundle.writer().mode(), OpenMode::ReadWrite);
      assert!(bundle.readers().iter().all(|r| r.mode() == OpenMode::ReadOnly));

      for reader in bundle.readers() {
         assert_eq!(scan(reader.pool(), 101).await.unwrap(), 100);
      }
   }
   assert_eq!(fleet.connection_count(), 8);

   let report = fleet.aggregate().await.unwrap();
   assert_eq!(report.connections(), 8);
   assert_eq!(report.totals().count(), 5);
   for kind in StatusKind::ALL {
      assert!(report.total(kind) >= 0, "{kind} went negative");
   }
   assert!(report.total(StatusKind::SchemaUsed) > 0);

   fleet.close().await.unwrap();
   assert_eq!(instance_dirs(&root), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registry_counts_every_connection() {
   let root = TempDir::new().unwrap();
   let fleet = provision_fleet(&config(&root, 3, 25, 2)).await.unwrap();

   let ids = fleet.connections();
   assert_eq!(ids.len(), 3 * (2 + 1));

   let from_handles: std::collections::HashSet<_> = fleet.handles().map(|h| h.connection_id()).collect();
   let from_registry: std::collections::HashSet<_> = ids.into_iter().collect();
   assert_eq!(from_handles, from_registry);

   fleet.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_instance_is_queryable() {
   let root = TempDir::new().unwrap();
   let fleet = provision_fleet(&config(&root, 1, 0, 1)).await.unwrap();

   let reader = &fleet.bundles()[0].readers()[0];
   assert_eq!(scan(reader.pool(), 1).await.unwrap(), 0);
   assert_eq!(scan(reader.pool(), 1_000).await.unwrap(), 0);

   fleet.close().await.unwrap();
}

#[tokio::test]
async fn test_zero_readers_keeps_only_writer() {
   let root = TempDir::new().unwrap();
   let fleet = provision_fleet(&config(&root, 2, 30, 0)).await.unwrap();

   for bundle in fleet.bundles() {
      assert_eq!(bundle.handle_count(), 1);
      assert_eq!(scan(bundle.writer().pool(), 31).await.unwrap(), 30);
   }
   assert_eq!(fleet.connection_count(), 2);

   fleet.close().await.unwrap();
}

#[tokio::test]
async fn test_zero_instances() {
   let root = TempDir::new().unwrap();
   let fleet = provision_fleet(&config(&root, 0, 10, 2)).await.unwrap();

   assert!(fleet.bundles().is_empty());
   let report = fleet.aggregate().await.unwrap();
   assert_eq!(report.connections(), 0);
   assert!(report.totals().all(|(_, total)| total == 0));

   fleet.close().await.unwrap();
}

#[tokio::test]
async fn test_independent_instances_have_equal_cardinality() {
   let root = TempDir::new().unwrap();
   let spec = InstanceSpec::from(&config(&root, 1, 57, 1));
   let registry = Arc::new(ConnectionRegistry::new());

   let first = provision(&spec, Arc::clone(&registry)).await.unwrap();
   let second = provision(&spec, Arc::clone(&registry)).await.unwrap();

   assert_ne!(first.path(), second.path());
   assert_eq!(first.rows(), second.rows());
   assert_eq!(
      scan(first.readers()[0].pool(), 58).await.unwrap(),
      scan(second.readers()[0].pool(), 58).await.unwrap()
   );

   first.close().await.unwrap();
   second.close().await.unwrap();
   assert_eq!(registry.len(), 4);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unusable_location_produces_no_bundle() {
   let root = TempDir::new().unwrap();
   let not_a_dir = root.path().join("file");
   std::fs::write(&not_a_dir, b"occupied").unwrap();

   let spec = InstanceSpec {
      temp_root: Some(not_a_dir),
      ..InstanceSpec::from(&config(&root, 1, 10, 3))
   };
   let registry = Arc::new(ConnectionRegistry::new());

   let err = provision(&spec, Arc::clone(&registry)).await.unwrap_err();
   assert!(matches!(err, Error::Io(_)), "got {err:?}");
   assert!(registry.is_empty(), "no handle should have been opened");
}

#[tokio::test]
async fn test_schema_failure_stops_provisioning() {
   let root = TempDir::new().unwrap();
   let base = InstanceSpec::from(&config(&root, 1, 10, 3));
   let spec = InstanceSpec {
      // The writer opens, but the table cannot be created in a one-page file.
      handle: HandleConfig {
         max_page_count: Some(1),
         ..base.handle.clone()
      },
      ..base
   };
   let registry = Arc::new(ConnectionRegistry::new());

   let err = provision(&spec, Arc::clone(&registry)).await.unwrap_err();
   assert!(
      matches!(err, Error::Workload(sqlx_sqlite_workload::Error::Schema(_))),
      "got {err:?}"
   );
   assert_eq!(registry.len(), 1, "only the writer should have been opened");
   assert_eq!(instance_dirs(&root), 0);
}

#[tokio::test]
async fn test_schema_setup_on_read_only_handle_fails() {
   let root = TempDir::new().unwrap();
   let path = root.path().join("db");
   let registry = Arc::new(ConnectionRegistry::new());
   let config = HandleConfig::default();

   let writer = StorageHandle::open(&path, OpenMode::ReadWrite, &config, Arc::clone(&registry))
      .await
      .unwrap();
   let reader = StorageHandle::open(&path, OpenMode::ReadOnly, &config, Arc::clone(&registry))
      .await
      .unwrap();

   let err = create_schema(reader.pool()).await.unwrap_err();
   assert!(matches!(err, sqlx_sqlite_workload::Error::Schema(_)), "got {err:?}");

   reader.close().await.unwrap();
   writer.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_instance_fails_the_fleet() {
   let root = TempDir::new().unwrap();
   let mut bad = config(&root, 3, 10, 1);
   bad.temp_root = Some(root.path().join("missing").join("nested"));

   let err = provision_fleet(&bad).await.unwrap_err();
   assert!(matches!(err, Error::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_provisioning() {
   let root = TempDir::new().unwrap();
   let mut bad = config(&root, 2, 10, 1);
   bad.batch_size = 0;

   let err = provision_fleet(&bad).await.unwrap_err();
   assert!(matches!(err, Error::Config(_)));
   assert_eq!(instance_dirs(&root), 0);
}

#[tokio::test]
async fn test_aggregate_refuses_closed_handle() {
   let root = TempDir::new().unwrap();
   let fleet = provision_fleet(&config(&root, 1, 10, 1)).await.unwrap();

   fleet.bundles()[0].writer().close().await.unwrap();

   let err = fleet.aggregate().await.unwrap_err();
   assert!(matches!(err, Error::StaleConnection { .. }), "got {err:?}");

   // Teardown still closes the reader and removes the directory, and reports
   // the writer's second close.
   let err = fleet.close().await.unwrap_err();
   match err {
      Error::Close { failed, .. } => assert_eq!(failed, 1),
      other => panic!("expected close error, got {other:?}"),
   }
   assert_eq!(instance_dirs(&root), 0);
}

// ============================================================================
// Full run
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_reports_once_then_shuts_down() {
   let root = TempDir::new().unwrap();
   let reported = Cell::new(0);

   let report = run(
      &config(&root, 2, 40, 2),
      |report| {
         assert_eq!(report.connections(), 6);
         reported.set(reported.get() + 1);
      },
      async { Ok(()) },
   )
   .await
   .unwrap();

   assert_eq!(reported.get(), 1);
   assert_eq!(report.connections(), 6);
   assert_eq!(instance_dirs(&root), 0);
}

#[tokio::test]
async fn test_run_closes_fleet_when_signal_fails() {
   let root = TempDir::new().unwrap();

   let err = run(&config(&root, 1, 5, 1), |_| {}, async {
      Err(Error::Signal(std::io::Error::other("no signal handler")))
   })
   .await
   .unwrap_err();

   assert!(matches!(err, Error::Signal(_)));
   assert_eq!(instance_dirs(&root), 0);
}
