//! Logical block to native sector translation.

use crate::error::ConstructionError;
use crate::storage::BackingStore;
use std::io;

/// Wraps a backing store and addresses it in logical blocks.
///
/// A logical block spans `page_size / sector_size` native sectors; the ratio
/// is checked to be exact when the adapter is built.
#[derive(Debug)]
pub struct BackingStoreAdapter<S> {
    store: S,
    page_size: u32,
    sectors_per_page: u64,
}

impl<S: BackingStore> BackingStoreAdapter<S> {
    /// Build an adapter for `page_size`-byte logical blocks.
    pub fn new(store: S, page_size: u32) -> Result<Self, ConstructionError> {
        let sector_size = store.sector_size();
        if page_size == 0 {
            return Err(ConstructionError::PageSizeZero);
        }
        if sector_size == 0 || page_size % sector_size != 0 {
            return Err(ConstructionError::PageSizeNotSectorMultiple {
                page_size,
                sector_size,
            });
        }
        Ok(Self {
            store,
            page_size,
            sectors_per_page: u64::from(page_size / sector_size),
        })
    }

    /// Logical block size in bytes.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Native sectors per logical block.
    pub fn sectors_per_page(&self) -> u64 {
        self.sectors_per_page
    }

    /// First native sector of logical `block`.
    pub fn native_sector(&self, block: u64) -> u64 {
        block * self.sectors_per_page
    }

    /// Read whole logical blocks starting at `block` into `buf`.
    pub fn read(&self, block: u64, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len() % self.page_size as usize, 0);
        self.store.read_sectors(self.native_sector(block), buf)
    }

    /// Write whole logical blocks starting at `block` from `data`.
    pub fn write(&self, block: u64, data: &[u8]) -> io::Result<()> {
        debug_assert_eq!(data.len() % self.page_size as usize, 0);
        self.store.write_sectors(self.native_sector(block), data)
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}
