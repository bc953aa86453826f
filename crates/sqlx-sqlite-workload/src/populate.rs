//! Batched write workload

use sqlx::{Connection, Executor, Pool, Sqlite, Statement, Transaction};
use tracing::{debug, trace};

use crate::random::random_text;
use crate::{Error, Result};

const CREATE_SCHEMA: &str = "DROP TABLE IF EXISTS t; CREATE TABLE t (i INTEGER, str TEXT);";
const INSERT_ROW: &str = "INSERT INTO t VALUES (?1, ?2)";

/// Drops and recreates the workload table.
pub async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
   sqlx::raw_sql(CREATE_SCHEMA)
      .execute(pool)
      .await
      .map_err(Error::Schema)?;
   Ok(())
}

/// Parameters of the write workload.
///
/// `total_rows` rows are inserted with keys `0..total_rows` and text of a
/// length drawn from `[min_len, max_len)`, committing every `batch_size` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWorkload {
   pub total_rows: u64,
   pub batch_size: u64,
   pub min_len: usize,
   pub max_len: usize,
}

impl WriteWorkload {
   pub fn validate(&self) -> Result<()> {
      if self.batch_size == 0 {
         return Err(Error::InvalidBatchSize);
      }
      if self.min_len >= self.max_len {
         return Err(Error::InvalidLengthRange {
            min_len: self.min_len,
            max_len: self.max_len,
         });
      }
      if i64::try_from(self.total_rows).is_err() {
         return Err(Error::InvalidRowCount(self.total_rows));
      }
      Ok(())
   }

   /// Inserts every row, one transaction per batch, and returns the row count.
   ///
   /// Each batch runs BEGIN, prepare, `min(batch_size, remaining)` inserts,
   /// finalize, COMMIT. sqlx keeps prepared statements in the connection's
   /// cache, so finalizing clears that cache. A failure rolls the batch back and is returned
   /// as is; batches committed before it stay committed.
   pub async fn populate(&self, pool: &Pool<Sqlite>) -> Result<u64> {
      self.validate()?;

      let total = self.total_rows as i64;
      let batch_size = self.batch_size.min(total as u64) as i64;
      let mut next_key: i64 = 0;
      let mut batches: u64 = 0;

      while next_key < total {
         let count = batch_size.min(total - next_key);
         let mut tx = pool.begin().await.map_err(Error::Begin)?;

         if let Err(e) = self.insert_batch(&mut tx, next_key, count).await {
            return Err(rollback(tx, e).await);
         }

         // A failed commit leaves the transaction open; dropping `tx` rolls it back.
         tx.commit().await.map_err(Error::Commit)?;

         next_key += count;
         batches += 1;
         trace!(committed = next_key, total, "Committed batch");
      }

      debug!(rows = total, batches, "Write workload finished");
      Ok(total as u64)
   }

   async fn insert_batch(&self, tx: &mut Transaction<'_, Sqlite>, first_key: i64, count: i64) -> Result<()> {
      let stmt = (&mut **tx).prepare(INSERT_ROW).await.map_err(Error::Prepare)?;

      for key in first_key..first_key + count {
         stmt
            .query()
            .bind(key)
            .bind(random_text(self.min_len, self.max_len))
            .execute(&mut **tx)
            .await
            .map_err(|source| Error::Insert { key, source })?;
      }

      drop(stmt);
      (&mut **tx).clear_cached_statements().await.map_err(Error::Finalize)?;
      Ok(())
   }
}

async fn rollback(tx: Transaction<'_, Sqlite>, error: Error) -> Error {
   match tx.rollback().await {
      Ok(()) => {
         debug!(error = %error, "Batch rolled back");
         error
      }
      Err(rollback_error) => Error::TransactionRollbackFailed {
         transaction_error: error.to_string(),
         rollback_error: rollback_error.to_string(),
      },
   }
}
