//! Preallocated page cache (`SQLITE_CONFIG_PAGECACHE`).

use std::ffi::CStr;
use std::os::raw::{c_int, c_void};

use libsqlite3_sys as ffi;
use tracing::info;

use crate::{Error, Result};

/// Page size the cache slots are sized for.
const PAGE_SIZE: usize = 4096;

/// How a preallocated page cache buffer was carved up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCacheLayout {
   /// Per-page header SQLite adds to each slot.
   pub header_size: usize,
   /// Page size plus header.
   pub slot_size: usize,
   /// Number of slots handed to SQLite.
   pub slots: usize,
}

/// Hands SQLite a fixed buffer of `total_bytes` to use for page cache lines.
///
/// Must be called before the first connection is opened in the process; once
/// SQLite is initialized every `sqlite3_config` call fails with
/// `SQLITE_MISUSE`. The buffer is leaked, since SQLite keeps using it until the
/// process exits.
pub fn configure_page_cache(total_bytes: usize) -> Result<PageCacheLayout> {
   // SAFETY: reads a compile-time constant.
   if unsafe { ffi::sqlite3_threadsafe() } == 0 {
      return Err(Error::NotThreadSafe);
   }

   let mut header_size: c_int = 0;
   // SAFETY: PCACHE_HDRSZ takes a single int* out parameter.
   let rc = unsafe { ffi::sqlite3_config(ffi::SQLITE_CONFIG_PCACHE_HDRSZ, &mut header_size as *mut c_int) };
   check(rc, "SQLITE_CONFIG_PCACHE_HDRSZ")?;

   let header_size = usize::try_from(header_size).unwrap_or_default();
   let slot_size = PAGE_SIZE + header_size;
   let slots = total_bytes / slot_size;
   if slots == 0 {
      return Err(Error::PageCacheTooSmall {
         bytes: total_bytes,
         slot_size,
      });
   }

   let too_large = || Error::PageCacheTooLarge { bytes: total_bytes };
   let sz = c_int::try_from(slot_size).map_err(|_| too_large())?;
   let n = c_int::try_from(slots).map_err(|_| too_large())?;

   // u64 words keep the buffer 8-byte aligned as SQLite requires.
   let mut buffer = vec![0u64; (slot_size * slots).div_ceil(8)].into_boxed_slice();

   // SAFETY: PAGECACHE takes (void*, int sz, int n); the buffer holds at least
   // sz * n bytes and is leaked below once SQLite has accepted it.
   let rc = unsafe {
      ffi::sqlite3_config(
         ffi::SQLITE_CONFIG_PAGECACHE,
         buffer.as_mut_ptr().cast::<c_void>(),
         sz,
         n,
      )
   };
   check(rc, "SQLITE_CONFIG_PAGECACHE")?;
   let _ = Box::leak(buffer);

   info!(total_bytes, slot_size, slots, "Configured SQLite page cache");

   Ok(PageCacheLayout {
      header_size,
      slot_size,
      slots,
   })
}

fn check(rc: c_int, option: &'static str) -> Result<()> {
   if rc == ffi::SQLITE_OK {
      return Ok(());
   }

   // SAFETY: sqlite3_errstr returns a static, NUL-terminated string.
   let message = unsafe { CStr::from_ptr(ffi::sqlite3_errstr(rc)) }
      .to_string_lossy()
      .into_owned();

   Err(Error::Config {
      option,
      code: rc,
      message,
   })
}
