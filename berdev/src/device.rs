//! The emulated device and its request interceptor.
//!
//! Every request runs through the same stages:
//!
//! ```text
//!  submit ──> validate ──┬── write ──> draw + mark bad/good ──> forward ──┐
//!                        │                                                ├──> completion
//!                        └── read ───> look up bad blocks ──┬─> forward ──┤
//!                                                           └─> fail ─────┘
//! ```
//!
//! A write always reaches the backing store; only the later readability of
//! its blocks is affected. A block's state reflects its most recent write,
//! so rewriting a bad block can make it good again. The marks are updated
//! before the data is forwarded: a write that the backing store then fails
//! still leaves its blocks marked (and counted) by that write's draws.
//!
//! ## Concurrency
//!
//! Requests may be submitted from any number of threads. The bad-block index
//! sits behind a single lock taken once per request: a write updates all of
//! its blocks under it, a read checks all of its blocks under it, so a read
//! racing a write sees the index either entirely before or entirely after
//! that write. Random draws happen before the lock is taken, and backing
//! store transfers after it is released. The index update of a write is
//! done before the write completes, so any read issued after the write's
//! completion sees its outcome.

use crate::adapter::BackingStoreAdapter;
use crate::config::{CorruptionMode, DeviceConfig};
use crate::error::{Completion, ConstructionError, RequestError};
use crate::fault;
use crate::index::SparseBitIndex;
use crate::random::RandomSource;
use crate::stats::{DeviceStats, StatsSnapshot};
use crate::storage::{BackingStore, BackingStoreProvider, DEFAULT_SECTOR_SIZE, MemoryBackingStore};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

/// Direction of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Transfer from the device into the caller's buffer.
    Read,
    /// Transfer from the caller's buffer to the device.
    Write,
}

/// A block device that injects uncorrectable read errors.
///
/// `S` is the backing store holding the data, `R` the source of the random
/// draws behind each fault decision.
#[derive(Debug)]
pub struct BerDevice<S, R> {
    config: DeviceConfig,
    adapter: BackingStoreAdapter<S>,
    index: Mutex<SparseBitIndex>,
    rng: R,
    exponent: AtomicI32,
    corruption_mode: AtomicU8,
    stats: DeviceStats,
}

impl<R: RandomSource> BerDevice<MemoryBackingStore, R> {
    /// Build a self-contained device over a private zero-filled memory store
    /// of exactly the configured size.
    ///
    /// The store uses 512-byte native sectors, or one sector per page when
    /// the page size is not a multiple of 512. The configured backing store
    /// identifier is kept but not resolved. A store that cannot be allocated
    /// fails construction with [`ConstructionError::BackingStore`].
    pub fn in_memory(config: DeviceConfig, rng: R) -> Result<Self, ConstructionError> {
        config.validate()?;
        let sector_size = if config.page_size % DEFAULT_SECTOR_SIZE == 0 {
            DEFAULT_SECTOR_SIZE
        } else {
            config.page_size
        };
        let bytes = config
            .capacity_bytes()
            .ok_or(ConstructionError::CapacityExceeded {
                required: u64::MAX,
                available: u64::MAX,
            })?;
        let store = MemoryBackingStore::try_new(bytes / u64::from(sector_size), sector_size)
            .map_err(|e| {
                tracing::warn!("Cannot allocate {} byte memory store: {}", bytes, e);
                ConstructionError::BackingStore(e)
            })?;
        Self::new(config, store, rng)
    }
}

impl<S: BackingStore, R: RandomSource> BerDevice<S, R> {
    /// Build a device in front of an already opened backing store.
    pub fn new(config: DeviceConfig, store: S, rng: R) -> Result<Self, ConstructionError> {
        config.validate_against(store.sector_size(), store.capacity_bytes())?;
        let adapter = BackingStoreAdapter::new(store, config.page_size)?;

        tracing::debug!(
            "Created device: page_size={}, page_count={}, exponent={}, mode={:?}, backing={:?}",
            config.page_size,
            config.page_count,
            config.error_rate_exponent,
            config.corruption_mode,
            config.backing_store
        );

        Ok(Self {
            exponent: AtomicI32::new(config.error_rate_exponent),
            corruption_mode: AtomicU8::new(config.corruption_mode.to_raw()),
            index: Mutex::new(SparseBitIndex::new()),
            stats: DeviceStats::default(),
            adapter,
            config,
            rng,
        })
    }

    /// Build a device over the store `provider` resolves for the configured
    /// backing store identifier.
    pub fn open<P>(config: DeviceConfig, provider: &P, rng: R) -> Result<Self, ConstructionError>
    where
        P: BackingStoreProvider<Store = S>,
    {
        config.validate()?;
        let store = provider.open(&config.backing_store).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ConstructionError::BackingStoreNotFound(config.backing_store.clone())
            } else {
                ConstructionError::BackingStore(e)
            }
        })?;
        Self::new(config, store, rng)
    }

    /// Configuration the device was built with.
    ///
    /// Runtime changes made through [`set_error_rate_exponent`](Self::set_error_rate_exponent)
    /// and [`set_corruption_mode`](Self::set_corruption_mode) are not reflected here.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Capacity in logical blocks.
    pub fn capacity(&self) -> u64 {
        self.config.page_count
    }

    /// Logical block size in bytes.
    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    /// Current error-rate exponent.
    pub fn error_rate_exponent(&self) -> i32 {
        self.exponent.load(Ordering::Relaxed)
    }

    /// Change the error rate for subsequent writes.
    ///
    /// Values outside `[-24, 0]` are clamped.
    pub fn set_error_rate_exponent(&self, exponent: i32) {
        let clamped = fault::clamp_exponent(exponent);
        if clamped != exponent {
            tracing::warn!("Error-rate exponent {} clamped to {}", exponent, clamped);
        }
        self.exponent.store(clamped, Ordering::Relaxed);
        tracing::debug!("Error-rate exponent set to {}", clamped);
    }

    /// Current bad-read behavior.
    pub fn corruption_mode(&self) -> CorruptionMode {
        CorruptionMode::from_raw(self.corruption_mode.load(Ordering::Relaxed))
    }

    /// Change the bad-read behavior for subsequent reads.
    pub fn set_corruption_mode(&self, mode: CorruptionMode) {
        self.corruption_mode.store(mode.to_raw(), Ordering::Relaxed);
        tracing::debug!("Corruption mode set to {:?}", mode);
    }

    /// Whether `block` is currently marked bad. Blocks past the end are good.
    pub fn is_block_bad(&self, block: u64) -> bool {
        block < self.capacity() && self.index.lock().get(block)
    }

    /// Number of blocks currently marked bad.
    pub fn bad_block_count(&self) -> u64 {
        self.index.lock().count_set()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The backing store.
    pub fn backing_store(&self) -> &S {
        self.adapter.store()
    }

    /// Tear the device down, releasing the bad-block index, and hand back
    /// the backing store.
    pub fn into_backing_store(self) -> S {
        tracing::debug!(
            "Releasing device with {} bad blocks",
            self.index.lock().count_set()
        );
        self.adapter.into_inner()
    }

    /// Submit one request of `count` blocks starting at `block`.
    ///
    /// For reads `buf` receives the data; for writes it supplies it. Only
    /// the first `count * page_size` bytes of `buf` are used.
    pub fn submit(&self, direction: Direction, block: u64, count: u64, buf: &mut [u8]) -> Completion {
        tracing::trace!(
            "Request: dir={:?}, block={}, count={}",
            direction,
            block,
            count
        );
        match direction {
            Direction::Read => self.read_blocks(block, count, buf),
            Direction::Write => self.write_blocks(block, count, buf),
        }
    }

    /// Read `buf.len() / page_size` whole blocks starting at `block`.
    ///
    /// A buffer reaching past the device end fails with `OutOfRange`; an
    /// in-range buffer that ends inside a block fails with `InvalidBuffer`.
    pub fn read(&self, block: u64, buf: &mut [u8]) -> Completion {
        let count = self.whole_blocks(block, buf.len())?;
        self.read_blocks(block, count, buf)
    }

    /// Write `data.len() / page_size` whole blocks starting at `block`.
    ///
    /// Length checks are the same as for [`read`](Self::read).
    pub fn write(&self, block: u64, data: &[u8]) -> Completion {
        let count = self.whole_blocks(block, data.len())?;
        self.write_blocks(block, count, data)
    }

    fn whole_blocks(&self, block: u64, len: usize) -> Result<u64, RequestError> {
        let page_size = self.config.page_size as usize;
        // blocks touched, counting a trailing partial block
        self.check_range(block, len.div_ceil(page_size) as u64)?;
        if len % page_size != 0 {
            return Err(RequestError::InvalidBuffer {
                expected: len.next_multiple_of(page_size),
                actual: len,
            });
        }
        Ok((len / page_size) as u64)
    }

    fn check_range(&self, block: u64, count: u64) -> Result<(), RequestError> {
        let capacity = self.capacity();
        let in_range = block
            .checked_add(count)
            .is_some_and(|end| end <= capacity);
        if !in_range {
            self.stats.record_out_of_range();
            tracing::debug!(
                "Request outside device: block={}, count={}, capacity={}",
                block,
                count,
                capacity
            );
            return Err(RequestError::OutOfRange {
                block,
                count,
                capacity,
            });
        }
        Ok(())
    }

    /// Check the request range and buffer, returning the transfer length.
    fn validate(&self, block: u64, count: u64, buf_len: usize) -> Result<usize, RequestError> {
        self.check_range(block, count)?;

        let bytes = count * u64::from(self.config.page_size);
        let expected = usize::try_from(bytes).map_err(|_| RequestError::InvalidBuffer {
            expected: usize::MAX,
            actual: buf_len,
        })?;
        if buf_len < expected {
            return Err(RequestError::InvalidBuffer {
                expected,
                actual: buf_len,
            });
        }
        Ok(expected)
    }

    /// Marks are updated before the data is forwarded, so a write the
    /// backing store fails still leaves its blocks marked by this write's
    /// draws.
    fn write_blocks(&self, block: u64, count: u64, data: &[u8]) -> Completion {
        let len = self.validate(block, count, data.len())?;
        if len == 0 {
            return Ok(0);
        }

        let exponent = self.error_rate_exponent();
        let verdicts: Vec<bool> = (0..count)
            .map(|_| fault::is_block_bad(exponent, self.rng.draw32(), self.rng.draw32()))
            .collect();

        {
            let mut index = self.index.lock();
            for (offset, &bad) in verdicts.iter().enumerate() {
                index.set_bit(block + offset as u64, bad);
            }
        }

        let marked = verdicts.iter().filter(|&&bad| bad).count() as u64;
        if marked > 0 {
            self.stats.record_marked_bad(marked);
            tracing::info!(
                "Write fault injected: {} of {} blocks at block {} marked bad (exponent {})",
                marked,
                count,
                block,
                exponent
            );
        }

        self.adapter
            .write(block, &data[..len])
            .map_err(|e| self.backing_failure(block, e))?;
        self.stats.record_write(len);
        Ok(len)
    }

    fn read_blocks(&self, block: u64, count: u64, buf: &mut [u8]) -> Completion {
        let len = self.validate(block, count, buf.len())?;
        if len == 0 {
            return Ok(0);
        }

        let mode = self.corruption_mode();
        let bad: Vec<u64> = {
            let index = self.index.lock();
            (block..block + count).filter(|&b| index.get(b)).collect()
        };

        if let Some(&first) = bad.first() {
            if mode == CorruptionMode::IoError {
                self.stats.record_read_error();
                tracing::info!(
                    "Read error injected: block {} is bad ({} bad in request)",
                    first,
                    bad.len()
                );
                return Err(RequestError::ReadError { block: first });
            }
        }

        let buf = &mut buf[..len];
        self.adapter
            .read(block, buf)
            .map_err(|e| self.backing_failure(block, e))?;

        if !bad.is_empty() {
            let page_size = self.config.page_size as usize;
            for &b in &bad {
                let start = (b - block) as usize * page_size;
                corrupt_block(b, &mut buf[start..start + page_size]);
            }
            self.stats.record_corrupted_read();
            tracing::info!(
                "Corrupted data returned for {} bad blocks starting at block {}",
                bad.len(),
                bad[0]
            );
        }

        self.stats.record_read(len);
        Ok(len)
    }

    fn backing_failure(&self, block: u64, err: io::Error) -> RequestError {
        self.stats.record_backing_error();
        tracing::warn!("Backing store transfer failed at block {}: {}", block, err);
        RequestError::BackingStore(err)
    }
}

/// Flip one bit of a bad block's data.
///
/// The choice is seeded by the block number and the block's first stored
/// bytes, so re-reading an unchanged bad block returns the same corruption.
fn corrupt_block(block: u64, buf: &mut [u8]) {
    if buf.is_empty() {
        return;
    }
    let pristine = buf.first_chunk::<8>().copied().unwrap_or([0u8; 8]);
    let seed = u64::from_le_bytes(pristine).wrapping_add(block);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let byte_idx = rng.random_range(0..buf.len());
    let bit_idx = rng.random_range(0..8u8);
    buf[byte_idx] ^= 1 << bit_idx;
}
