//! # berdev
//!
//! A block device emulator that models the uncorrectable bit error rate
//! (UBER) of real media, for testing filesystems, RAID layers and backup
//! tools against rare read failures.
//!
//! Every write draws a fault decision per block: with probability close to
//! `10^e` for a configured exponent `e`, the block is marked bad. Reading a
//! bad block either fails the request or returns corrupted bytes, until the
//! next write to that block. Data always flows through to a real backing
//! store; only readability is emulated.
//!
//! ## Core Components
//!
//! - [`SparseBitIndex`]: per-block bad marks, sized by marks rather than capacity
//! - [`fault`]: the error threshold table and bad-block decision
//! - [`BackingStoreAdapter`]: logical block to native sector translation
//! - [`BerDevice`]: the request interceptor tying them together
//! - [`RequestQueue`]: hand-off queue for concurrent submitters
//!
//! ## Quick Start
//!
//! ```rust
//! use berdev::{BerDevice, DeviceConfig, FailureKind, ScriptedRandomSource};
//!
//! let config = DeviceConfig::always_fail().page_size(4096).page_count(16);
//! let device = BerDevice::in_memory(config, ScriptedRandomSource::never_bad())?;
//!
//! device.write(3, &[0xAB; 4096])?;
//! let mut buf = vec![0u8; 4096];
//! let err = device.read(3, &mut buf).unwrap_err();
//! assert_eq!(err.kind(), FailureKind::ReadError);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Fault Injection Overview
//!
//! | Mechanism | Config | What it tests |
//! |-----------|--------|---------------|
//! | Bad block on write | `error_rate_exponent` | Read error handling, redundancy |
//! | Failed read | `CorruptionMode::IoError` | Retry and repair paths |
//! | Silent corruption | `CorruptionMode::ReturnCorruptData` | Checksum validation |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Logical block to native sector translation
pub mod adapter;

/// Device configuration
pub mod config;

/// The emulated device and request interceptor
pub mod device;

/// Error types
pub mod error;

/// Bad-block decision and threshold table
pub mod fault;

/// Sparse bad-block bitmap
pub mod index;

/// Request hand-off queue
pub mod queue;

/// Random draw sources
pub mod random;

/// I/O and fault counters
pub mod stats;

/// Backing stores
pub mod storage;

pub use adapter::BackingStoreAdapter;
pub use config::{CorruptionMode, DeviceConfig};
pub use device::{BerDevice, Direction};
pub use error::{Completion, ConstructionError, FailureKind, RequestError};
pub use index::SparseBitIndex;
pub use queue::{Request, RequestId, RequestQueue};
pub use random::{RandomSource, ScriptedRandomSource, SeededRandomSource, ThreadRandomSource};
pub use stats::{DeviceStats, StatsSnapshot};
pub use storage::{
    BackingStore, BackingStoreProvider, FileBackingStore, FileProvider, MemoryBackingStore,
    MemoryProvider,
};
