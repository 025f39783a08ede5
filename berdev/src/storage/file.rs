//! File-backed store.
//!
//! Puts the emulated device in front of an existing file or block device
//! node. The file must already exist; its length fixes the capacity.

use super::{BackingStore, BackingStoreProvider, DEFAULT_SECTOR_SIZE, checked_range};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Store backed by a file opened for reading and writing.
#[derive(Debug)]
pub struct FileBackingStore {
    file: Mutex<File>,
    sector_size: u32,
    sectors: u64,
}

impl FileBackingStore {
    /// Open the existing file at `path` with `sector_size`-byte sectors.
    ///
    /// Trailing bytes that do not fill a whole sector are not addressable.
    pub fn open(path: impl AsRef<Path>, sector_size: u32) -> io::Result<Self> {
        if sector_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "sector size must be non-zero",
            ));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            sector_size,
            sectors: len / u64::from(sector_size),
        })
    }

    /// Flush written data to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.lock().sync_data()
    }
}

impl BackingStore for FileBackingStore {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn capacity_sectors(&self) -> u64 {
        self.sectors
    }

    fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> io::Result<()> {
        let offset = checked_range(sector, self.sector_size, buf.len(), self.capacity_bytes())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn write_sectors(&self, sector: u64, data: &[u8]) -> io::Result<()> {
        let offset = checked_range(sector, self.sector_size, data.len(), self.capacity_bytes())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)
    }
}

/// Opens file paths as backing stores.
#[derive(Debug, Clone, Copy)]
pub struct FileProvider {
    sector_size: u32,
}

impl Default for FileProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FileProvider {
    /// Provider using 512-byte native sectors.
    pub fn new() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    /// Provider using `sector_size`-byte native sectors.
    pub fn with_sector_size(sector_size: u32) -> Self {
        Self { sector_size }
    }
}

impl BackingStoreProvider for FileProvider {
    type Store = FileBackingStore;

    fn open(&self, identifier: &str) -> io::Result<Self::Store> {
        FileBackingStore::open(identifier, self.sector_size)
    }
}
