/// Result type alias for workload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for write and read workloads.
///
/// Every variant is fatal to the workload that produced it; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Dropping or creating the table failed.
   #[error("schema setup failed: {0}")]
   Schema(#[source] sqlx::Error),

   /// Starting a batch transaction failed.
   #[error("failed to begin batch transaction: {0}")]
   Begin(#[source] sqlx::Error),

   /// Preparing the insert statement failed.
   #[error("failed to prepare insert statement: {0}")]
   Prepare(#[source] sqlx::Error),

   /// Inserting one row failed.
   #[error("failed to insert row {key}: {source}")]
   Insert { key: i64, source: sqlx::Error },

   /// Finalizing the insert statement failed.
   #[error("failed to finalize insert statement: {0}")]
   Finalize(#[source] sqlx::Error),

   /// Committing a batch failed.
   #[error("failed to commit batch: {0}")]
   Commit(#[source] sqlx::Error),

   /// A batch failed and rolling it back also failed.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: String,
      rollback_error: String,
   },

   /// The range query could not be issued or the cursor failed.
   #[error("scan query failed: {0}")]
   Query(#[source] sqlx::Error),

   /// A row could not be materialized into its typed fields.
   #[error("failed to read row: {0}")]
   Row(#[source] sqlx::Error),

   /// Batch size must be greater than zero.
   #[error("batch size must be greater than zero")]
   InvalidBatchSize,

   /// Row count does not fit the integer key column.
   #[error("row count {0} exceeds the largest integer key")]
   InvalidRowCount(u64),

   /// String length range is empty.
   #[error("string length range [{min_len}, {max_len}) is empty")]
   InvalidLengthRange { min_len: usize, max_len: usize },
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::Schema(_) => "SCHEMA_ERROR".to_string(),
         Error::Begin(e)
         | Error::Prepare(e)
         | Error::Finalize(e)
         | Error::Commit(e)
         | Error::Insert { source: e, .. } => {
            sqlite_code(e).unwrap_or_else(|| "TRANSACTION_ERROR".to_string())
         }
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::Query(e) | Error::Row(e) => sqlite_code(e).unwrap_or_else(|| "QUERY_ERROR".to_string()),
         Error::InvalidBatchSize => "INVALID_BATCH_SIZE".to_string(),
         Error::InvalidLengthRange { .. } => "INVALID_LENGTH_RANGE".to_string(),
         Error::InvalidRowCount(_) => "INVALID_ROW_COUNT".to_string(),
      }
   }
}

fn sqlite_code(e: &sqlx::Error) -> Option<String> {
   e.as_database_error()
      .and_then(|db_err| db_err.code())
      .map(|code| format!("SQLITE_{}", code))
}
