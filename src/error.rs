use uuid::Uuid;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the harness.
///
/// Everything except [`Error::Close`] is fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Opening or closing a storage handle failed.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// Schema setup or the write workload failed.
   #[error(transparent)]
   Workload(#[from] sqlx_sqlite_workload::Error),

   /// A status or configuration call into SQLite failed.
   #[error(transparent)]
   Registry(#[from] sqlx_sqlite_conn_registry::Error),

   /// Error from SQLx outside of a workload.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// One reader's scan failed.
   #[error("instance {instance} reader {reader} failed: {source}")]
   Reader {
      instance: Uuid,
      reader: usize,
      source: sqlx_sqlite_workload::Error,
   },

   /// A registered connection no longer belongs to an open handle.
   #[error("registered connection {conn} is not owned by an open handle")]
   StaleConnection { conn: String },

   /// A spawned task panicked or was cancelled.
   #[error("{task} task did not complete: {source}")]
   Join {
      task: &'static str,
      source: tokio::task::JoinError,
   },

   /// One or more handles failed to close during teardown.
   #[error("failed to close {failed} handle(s); first error: {first}")]
   Close { failed: usize, first: Box<Error> },

   /// Configuration values are inconsistent.
   #[error("invalid configuration: {0}")]
   Config(String),

   /// Configuration file is not valid TOML for [`BenchConfig`](crate::BenchConfig).
   #[error("invalid configuration file: {0}")]
   Toml(#[from] toml::de::Error),

   /// Waiting for the shutdown signal failed.
   #[error("failed to listen for shutdown signal: {0}")]
   Signal(#[source] std::io::Error),

   /// I/O error creating or removing database directories.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   /// Collapses teardown failures into one error, or `Ok` if there were none.
   pub(crate) fn from_close_failures(failures: Vec<Error>) -> Result<()> {
      let failed = failures
         .iter()
         .map(|e| match e {
            Error::Close { failed, .. } => *failed,
            _ => 1,
         })
         .sum();

      match failures.into_iter().next() {
         None => Ok(()),
         Some(Error::Close { first, .. }) => Err(Error::Close { failed, first }),
         Some(first) => Err(Error::Close {
            failed,
            first: Box::new(first),
         }),
      }
   }

   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::Open { .. }) => "OPEN_ERROR".to_string(),
         Error::ConnectionManager(_) => "CLOSE_ERROR".to_string(),
         Error::Workload(e) => e.error_code(),
         Error::Registry(sqlx_sqlite_conn_registry::Error::Status { .. }) => "STATUS_ERROR".to_string(),
         Error::Registry(_) => "ENGINE_CONFIG_ERROR".to_string(),
         Error::Sqlx(_) => "SQLX_ERROR".to_string(),
         Error::Reader { source, .. } => source.error_code(),
         Error::StaleConnection { .. } => "STATUS_ERROR".to_string(),
         Error::Join { .. } => "TASK_FAILED".to_string(),
         Error::Close { .. } => "CLOSE_ERROR".to_string(),
         Error::Config(_) | Error::Toml(_) => "CONFIG_ERROR".to_string(),
         Error::Signal(_) => "SIGNAL_ERROR".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn closed(path: &str) -> Error {
      Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::Closed { path: path.into() })
   }

   #[test]
   fn test_no_close_failures_is_ok() {
      assert!(Error::from_close_failures(Vec::new()).is_ok());
   }

   #[test]
   fn test_close_failures_keep_first_and_count_all() {
      let err = Error::from_close_failures(vec![closed("a"), closed("b"), closed("c")]).unwrap_err();
      match err {
         Error::Close { failed, first } => {
            assert_eq!(failed, 3);
            assert!(first.to_string().contains("a"));
         }
         other => panic!("expected close error, got {other:?}"),
      }
   }

   #[test]
   fn test_nested_close_failures_are_flattened() {
      let per_bundle = vec![
         Error::from_close_failures(vec![closed("a"), closed("b")]).unwrap_err(),
         Error::from_close_failures(vec![closed("c")]).unwrap_err(),
      ];
      let err = Error::from_close_failures(per_bundle).unwrap_err();
      match err {
         Error::Close { failed, first } => {
            assert_eq!(failed, 3);
            assert!(matches!(*first, Error::ConnectionManager(_)));
         }
         other => panic!("expected close error, got {other:?}"),
      }
   }

   #[test]
   fn test_error_codes() {
      assert_eq!(closed("a").error_code(), "CLOSE_ERROR");
      assert_eq!(Error::Config("x".into()).error_code(), "CONFIG_ERROR");
      assert_eq!(
         Error::StaleConnection { conn: "0x1".into() }.error_code(),
         "STATUS_ERROR"
      );
      assert_eq!(
         Error::Workload(sqlx_sqlite_workload::Error::InvalidBatchSize).error_code(),
         "INVALID_BATCH_SIZE"
      );
   }
}
