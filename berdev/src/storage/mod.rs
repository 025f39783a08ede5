//! Backing stores that hold the emulated device's data.
//!
//! A backing store is addressed in its own native sectors. The device never
//! interprets the bytes it forwards; faults live in the device's bad-block
//! index, not in the stored data.

/// File-backed store
pub mod file;

/// In-memory store and named registry
pub mod memory;

use std::io;
use std::sync::Arc;

pub use file::{FileBackingStore, FileProvider};
pub use memory::{MemoryBackingStore, MemoryProvider};

/// Sector size of the stores created for self-contained devices.
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Sector-addressed storage the device forwards transfers to.
///
/// Transfers may block on the store's own I/O; the device never calls them
/// while holding its bad-block index lock.
pub trait BackingStore: Send + Sync {
    /// Native sector size in bytes.
    fn sector_size(&self) -> u32;

    /// Capacity in native sectors.
    fn capacity_sectors(&self) -> u64;

    /// Read `buf.len()` bytes starting at native sector `sector`.
    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Write `data` starting at native sector `sector`.
    fn write_sectors(&self, sector: u64, data: &[u8]) -> io::Result<()>;

    /// Capacity in bytes.
    fn capacity_bytes(&self) -> u64 {
        self.capacity_sectors() * u64::from(self.sector_size())
    }
}

impl<S: BackingStore + ?Sized> BackingStore for Arc<S> {
    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn capacity_sectors(&self) -> u64 {
        (**self).capacity_sectors()
    }

    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_sectors(sector, buf)
    }

    fn write_sectors(&self, sector: u64, data: &[u8]) -> io::Result<()> {
        (**self).write_sectors(sector, data)
    }
}

/// Resolves a backing store identifier to an open store.
pub trait BackingStoreProvider {
    /// Store type handed out by this provider.
    type Store: BackingStore + 'static;

    /// Open the store named `identifier`.
    ///
    /// Returns an error of kind [`io::ErrorKind::NotFound`] when no such
    /// store exists.
    fn open(&self, identifier: &str) -> io::Result<Self::Store>;
}

/// Byte offset of `sector`, checking that `len` bytes fit in `capacity`.
pub(crate) fn checked_range(
    sector: u64,
    sector_size: u32,
    len: usize,
    capacity: u64,
) -> io::Result<u64> {
    let offset = sector
        .checked_mul(u64::from(sector_size))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sector overflow"))?;
    let end = offset
        .checked_add(len as u64)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset overflow"))?;

    if end > capacity {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "transfer past end of store: sector={}, len={}, size={}",
                sector, len, capacity
            ),
        ));
    }
    Ok(offset)
}
