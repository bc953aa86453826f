//! Runs in its own test binary: the page cache must be configured before
//! anything in the process opens a connection.

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use sqlx_sqlite_conn_registry::configure_page_cache;

#[tokio::test]
async fn test_configure_before_first_open() {
   let layout = configure_page_cache(8 * 1024 * 1024).unwrap();

   assert!(layout.header_size > 0);
   assert_eq!(layout.slot_size, 4096 + layout.header_size);
   assert_eq!(layout.slots, 8 * 1024 * 1024 / layout.slot_size);
   assert!(layout.slots > 0);

   let temp_dir = tempfile::TempDir::new().unwrap();
   let mut conn = SqliteConnectOptions::new()
      .filename(temp_dir.path().join("test.db"))
      .create_if_missing(true)
      .connect()
      .await
      .unwrap();

   sqlx::query("CREATE TABLE t (i INTEGER)").execute(&mut conn).await.unwrap();
   sqlx::query("INSERT INTO t VALUES (1), (2)").execute(&mut conn).await.unwrap();
   let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
      .fetch_one(&mut conn)
      .await
      .unwrap();
   assert_eq!(count, 2);

   conn.close().await.unwrap();
}
