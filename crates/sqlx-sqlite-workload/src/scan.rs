//! Streaming read workload

use futures::TryStreamExt;
use sqlx::error::UnexpectedNullError;
use sqlx::{Pool, Row, Sqlite};
use tracing::trace;

use crate::{Error, Result};

const SELECT_RANGE: &str = "SELECT i, str FROM t WHERE i < ?1";

/// Selects every row with key below `upper_bound` and drains the cursor.
///
/// Each row is decoded into its typed fields and discarded. A NULL in either
/// column fails the row. Returns the number of rows read. The cursor is released when the stream drops, including on
/// the first error.
pub async fn scan(pool: &Pool<Sqlite>, upper_bound: i64) -> Result<u64> {
   let mut rows = sqlx::query(SELECT_RANGE).bind(upper_bound).fetch(pool);
   let mut count: u64 = 0;

   while let Some(row) = rows.try_next().await.map_err(Error::Query)? {
      let _key: i64 = not_null(row.try_get(0).map_err(Error::Row)?, 0)?;
      let _text: &str = not_null(row.try_get(1).map_err(Error::Row)?, 1)?;
      count += 1;
   }

   trace!(upper_bound, rows = count, "Scan drained");
   Ok(count)
}

// sqlx decodes NULL as a default value for non-Option targets, so columns are
// read as Option and a None is rejected here.
fn not_null<T>(value: Option<T>, index: usize) -> Result<T> {
   value.ok_or_else(|| {
      Error::Row(sqlx::Error::ColumnDecode {
         index: format!("{index:?}"),
         source: Box::new(UnexpectedNullError),
      })
   })
}
