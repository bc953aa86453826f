//! # sqlx-sqlite-workload
//!
//! The two halves of the load harness, each running against a single sqlx pool:
//!
//! - **[`WriteWorkload::populate`]**: sequential keys with random text, inserted in
//!   batches of one transaction each
//! - **[`scan`]**: one range query whose cursor is drained row by row
//!
//! Both operate on table [`TABLE`] as created by [`create_schema`].

mod error;
mod populate;
mod random;
mod scan;

pub use error::{Error, Result};
pub use populate::{WriteWorkload, create_schema};
pub use random::random_text;
pub use scan::scan;

/// Table every workload writes to and reads from.
pub const TABLE: &str = "t";
