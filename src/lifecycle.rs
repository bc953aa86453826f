//! Provisioning and teardown of one database instance

use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx_sqlite_conn_mgr::{HandleConfig, OpenMode, StorageHandle};
use sqlx_sqlite_conn_registry::ConnectionRegistry;
use sqlx_sqlite_workload::{WriteWorkload, create_schema, scan};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BenchConfig;
use crate::{Error, Result};

/// File name of the database inside each instance directory.
const DB_FILE_NAME: &str = "db";

/// Everything one instance needs to provision itself.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
   pub workload: WriteWorkload,
   pub readers: usize,
   pub handle: HandleConfig,
   pub temp_root: Option<PathBuf>,
}

impl From<&BenchConfig> for InstanceSpec {
   fn from(config: &BenchConfig) -> Self {
      Self {
         workload: config.workload(),
         readers: config.readers,
         handle: config.handle.clone(),
         temp_root: config.temp_root.clone(),
      }
   }
}

/// Every handle opened for one instance, plus its storage directory.
///
/// Produced by [`provision`] and consumed by [`CloseBundle::close`], so a
/// bundle can only be torn down once.
#[derive(Debug)]
#[must_use = "dropping a bundle closes its handles without reporting close errors"]
pub struct CloseBundle {
   id: Uuid,
   readers: Vec<StorageHandle>,
   writer: StorageHandle,
   rows: u64,
   // Declared last so it is removed after the handles are dropped.
   dir: TempDir,
}

impl CloseBundle {
   pub fn id(&self) -> Uuid {
      self.id
   }

   /// Path of the instance's database file.
   pub fn path(&self) -> &Path {
      self.writer.path()
   }

   pub fn writer(&self) -> &StorageHandle {
      &self.writer
   }

   pub fn readers(&self) -> &[StorageHandle] {
      &self.readers
   }

   /// Rows the write workload committed.
   pub fn rows(&self) -> u64 {
      self.rows
   }

   /// Readers followed by the writer, in close order.
   pub fn handles(&self) -> impl Iterator<Item = &StorageHandle> {
      self.readers.iter().chain(iter::once(&self.writer))
   }

   pub fn handle_count(&self) -> usize {
      self.readers.len() + 1
   }

   /// Closes every reader, then the writer, then removes the directory.
   ///
   /// Every step is attempted even after a failure. The first failure is
   /// returned inside [`Error::Close`].
   pub async fn close(self) -> Result<()> {
      Error::from_close_failures(self.close_all().await)
   }

   pub(crate) async fn close_all(self) -> Vec<Error> {
      let mut failures = Vec::new();

      for handle in self.handles() {
         if let Err(e) = handle.close().await {
            warn!(instance = %self.id, path = %handle.path().display(), mode = %handle.mode(), error = %e, "Failed to close handle");
            failures.push(Error::from(e));
         }
      }

      let dir = self.dir.path().to_path_buf();
      if let Err(e) = self.dir.close() {
         warn!(instance = %self.id, dir = %dir.display(), error = %e, "Failed to remove instance directory");
         failures.push(Error::Io(e));
      }

      debug!(instance = %self.id, failures = failures.len(), "Closed instance");
      failures
   }
}

/// Creates, populates and scans one database instance.
///
/// 1. Creates a fresh temporary directory and opens the writer inside it
/// 2. Recreates the table; a failure here aborts before any workload
/// 3. Runs the write workload to completion
/// 4. Opens `readers` read-only handles, only now that every batch has committed
/// 5. Scans concurrently, one task per reader, and waits for all of them
///
/// Any failure is returned after the opened handles are dropped and the
/// directory removed.
pub async fn provision(spec: &InstanceSpec, registry: Arc<ConnectionRegistry>) -> Result<CloseBundle> {
   let id = Uuid::new_v4();
   let dir = create_instance_dir(spec.temp_root.as_deref())?;
   let path = dir.path().join(DB_FILE_NAME);
   debug!(instance = %id, path = %path.display(), "Provisioning instance");

   let writer = StorageHandle::open(&path, OpenMode::ReadWrite, &spec.handle, Arc::clone(&registry)).await?;
   create_schema(writer.pool()).await?;

   let rows = spec.workload.populate(writer.pool()).await?;
   debug!(instance = %id, rows, "Write workload committed");

   let mut readers = Vec::with_capacity(spec.readers);
   for _ in 0..spec.readers {
      readers.push(StorageHandle::open(&path, OpenMode::ReadOnly, &spec.handle, Arc::clone(&registry)).await?);
   }

   // Keys are 0..rows, so this bound selects every row.
   let upper_bound = i64::try_from(rows).unwrap_or(i64::MAX);
   let readers = run_readers(id, readers, upper_bound, rows).await?;

   info!(instance = %id, rows, readers = readers.len(), "Instance provisioned");

   Ok(CloseBundle {
      id,
      readers,
      writer,
      rows,
      dir,
   })
}

fn create_instance_dir(temp_root: Option<&Path>) -> Result<TempDir> {
   let mut builder = tempfile::Builder::new();
   builder.prefix("fanout-");

   let dir = match temp_root {
      Some(root) => builder.tempdir_in(root)?,
      None => builder.tempdir()?,
   };
   Ok(dir)
}

type ReaderTask = JoinHandle<(StorageHandle, sqlx_sqlite_workload::Result<u64>)>;

/// Scans through every reader concurrently and hands the readers back.
///
/// All tasks are joined before returning; the first failure wins.
async fn run_readers(
   instance: Uuid,
   readers: Vec<StorageHandle>,
   upper_bound: i64,
   expected: u64,
) -> Result<Vec<StorageHandle>> {
   let tasks: Vec<ReaderTask> = readers
      .into_iter()
      .map(|reader| {
         tokio::spawn(async move {
            let result = scan(reader.pool(), upper_bound).await;
            (reader, result)
         })
      })
      .collect();

   let mut joined = Vec::with_capacity(tasks.len());
   let mut first_error = None;

   for (index, task) in tasks.into_iter().enumerate() {
      match task.await {
         Ok((reader, Ok(rows))) => {
            if rows != expected {
               warn!(%instance, reader = index, rows, expected, "Reader saw an unexpected row count");
            }
            joined.push(reader);
         }
         Ok((reader, Err(source))) => {
            error!(%instance, reader = index, error = %source, "Reader failed");
            first_error.get_or_insert(Error::Reader {
               instance,
               reader: index,
               source,
            });
            joined.push(reader);
         }
         Err(source) => {
            error!(%instance, reader = index, error = %source, "Reader task did not complete");
            first_error.get_or_insert(Error::Join { task: "reader", source });
         }
      }
   }

   match first_error {
      Some(e) => Err(e),
      None => Ok(joined),
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   async fn seeded_db(dir: &TempDir, name: &str, rows: &str, registry: &Arc<ConnectionRegistry>) -> PathBuf {
      let path = dir.path().join(name);
      let writer = StorageHandle::open(&path, OpenMode::ReadWrite, &HandleConfig::default(), Arc::clone(registry))
         .await
         .unwrap();
      create_schema(writer.pool()).await.unwrap();
      sqlx::query(&format!("INSERT INTO t VALUES {rows}"))
         .execute(writer.pool())
         .await
         .unwrap();
      writer.close().await.unwrap();
      path
   }

   async fn open_readers(paths: &[&PathBuf], registry: &Arc<ConnectionRegistry>) -> Vec<StorageHandle> {
      let mut readers = Vec::new();
      for path in paths {
         readers.push(
            StorageHandle::open(path, OpenMode::ReadOnly, &HandleConfig::default(), Arc::clone(registry))
               .await
               .unwrap(),
         );
      }
      readers
   }

   #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
   async fn test_readers_are_handed_back() {
      let dir = TempDir::new().unwrap();
      let registry = Arc::new(ConnectionRegistry::new());
      let good = seeded_db(&dir, "good", "(0, 'a'), (1, 'b')", &registry).await;

      let readers = open_readers(&[&good, &good], &registry).await;
      let ids: Vec<_> = readers.iter().map(StorageHandle::connection_id).collect();

      let readers = run_readers(Uuid::new_v4(), readers, 2, 2).await.unwrap();
      let returned: Vec<_> = readers.iter().map(StorageHandle::connection_id).collect();
      assert_eq!(returned, ids);
   }

   #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
   async fn test_first_failing_reader_fails_instance() {
      let dir = TempDir::new().unwrap();
      let registry = Arc::new(ConnectionRegistry::new());
      let good = seeded_db(&dir, "good", "(0, 'a'), (1, 'b')", &registry).await;
      let bad = seeded_db(&dir, "bad", "(0, 'a'), (1, NULL)", &registry).await;

      let readers = open_readers(&[&bad, &good, &bad], &registry).await;
      let err = run_readers(Uuid::new_v4(), readers, 2, 2).await.unwrap_err();
      match err {
         Error::Reader { reader, source, .. } => {
            assert_eq!(reader, 0);
            assert!(matches!(source, sqlx_sqlite_workload::Error::Row(_)), "got {source:?}");
         }
         other => panic!("expected reader error, got {other:?}"),
      }
   }

   #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
   async fn test_failure_after_successful_readers_is_reported() {
      let dir = TempDir::new().unwrap();
      let registry = Arc::new(ConnectionRegistry::new());
      let good = seeded_db(&dir, "good", "(0, 'a'), (1, 'b')", &registry).await;
      let bad = seeded_db(&dir, "bad", "(0, 'a'), (1, NULL)", &registry).await;

      // Every task is joined, so the last reader's failure still surfaces.
      let readers = open_readers(&[&good, &good, &bad], &registry).await;
      let err = run_readers(Uuid::new_v4(), readers, 2, 2).await.unwrap_err();
      assert!(matches!(err, Error::Reader { reader: 2, .. }), "got {err:?}");
      assert_eq!(err.error_code(), "QUERY_ERROR");
   }
}
