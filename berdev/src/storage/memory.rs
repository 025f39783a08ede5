//! In-memory backing store.
//!
//! Used for self-contained devices, where the emulated device owns its
//! data, and for tests. A store can be told to fail every transfer so the
//! backing-store error path can be exercised.

use super::{BackingStore, BackingStoreProvider, checked_range};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sector-addressed store held entirely in memory.
#[derive(Debug)]
pub struct MemoryBackingStore {
    data: RwLock<Vec<u8>>,
    sector_size: u32,
    sectors: u64,
    failing: AtomicBool,
}

impl MemoryBackingStore {
    /// Create a zero-filled store of `sectors` sectors of `sector_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `sector_size` is zero or the memory cannot be allocated.
    pub fn new(sectors: u64, sector_size: u32) -> Self {
        Self::with_fill(sectors, sector_size, 0)
    }

    /// Create a store whose every byte starts as `fill`.
    ///
    /// # Panics
    ///
    /// Panics if `sector_size` is zero or the memory cannot be allocated.
    pub fn with_fill(sectors: u64, sector_size: u32, fill: u8) -> Self {
        match Self::try_with_fill(sectors, sector_size, fill) {
            Ok(store) => store,
            Err(e) => panic!("cannot create memory store: {e}"),
        }
    }

    /// Fallible [`new`](Self::new).
    pub fn try_new(sectors: u64, sector_size: u32) -> io::Result<Self> {
        Self::try_with_fill(sectors, sector_size, 0)
    }

    /// Fallible [`with_fill`](Self::with_fill): reports a zero sector size
    /// or a failed allocation as an error instead of aborting.
    pub fn try_with_fill(sectors: u64, sector_size: u32, fill: u8) -> io::Result<Self> {
        if sector_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "sector size must be non-zero",
            ));
        }
        let size = sectors
            .checked_mul(u64::from(sector_size))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("{sectors} sectors of {sector_size} bytes exceed the address space"),
                )
            })?;

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        data.resize(size, fill);

        Ok(Self {
            data: RwLock::new(data),
            sector_size,
            sectors,
            failing: AtomicBool::new(false),
        })
    }

    /// Make every subsequent transfer fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Copy of the raw bytes, for inspection.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    fn check_failing(&self) -> io::Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(io::Error::other("injected backing store failure"));
        }
        Ok(())
    }
}

impl BackingStore for MemoryBackingStore {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn capacity_sectors(&self) -> u64 {
        self.sectors
    }

    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> io::Result<()> {
        self.check_failing()?;
        let offset = checked_range(sector, self.sector_size, buf.len(), self.capacity_bytes())?
            as usize;
        buf.copy_from_slice(&self.data.read()[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_sectors(&self, sector: u64, data: &[u8]) -> io::Result<()> {
        self.check_failing()?;
        let offset = checked_range(sector, self.sector_size, data.len(), self.capacity_bytes())?
            as usize;
        self.data.write()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Named registry of shared in-memory stores.
///
/// Opening the same name twice returns handles to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    stores: Arc<Mutex<HashMap<String, Arc<MemoryBackingStore>>>>,
}

impl MemoryProvider {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `name`, replacing any previous entry.
    pub fn insert(&self, name: impl Into<String>, store: MemoryBackingStore) -> Arc<MemoryBackingStore> {
        let store = Arc::new(store);
        self.stores.lock().insert(name.into(), Arc::clone(&store));
        store
    }
}

impl BackingStoreProvider for MemoryProvider {
    type Store = Arc<MemoryBackingStore>;

    fn open(&self, identifier: &str) -> io::Result<Self::Store> {
        self.stores.lock().get(identifier).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no memory store named {identifier:?}"),
            )
        })
    }
}
