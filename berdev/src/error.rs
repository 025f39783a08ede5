//! Error types for device construction and request handling.

use std::io;
use thiserror::Error;

/// Errors that prevent a device from being constructed.
///
/// No device exists when construction fails; nothing has to be torn down.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// The configured page size is zero.
    #[error("page size must be non-zero")]
    PageSizeZero,
    /// The configured page count is zero.
    #[error("page count must be non-zero")]
    PageCountZero,
    /// The page size is not an exact multiple of the backing store's sector size.
    #[error("page size {page_size} is not a multiple of the native sector size {sector_size}")]
    PageSizeNotSectorMultiple {
        /// Configured logical page size in bytes.
        page_size: u32,
        /// Native sector size of the backing store in bytes.
        sector_size: u32,
    },
    /// The device does not fit in the backing store.
    #[error("device needs {required} bytes but the backing store holds {available}")]
    CapacityExceeded {
        /// Bytes the device would address.
        required: u64,
        /// Bytes the backing store provides.
        available: u64,
    },
    /// The page count exceeds what the bad-block index can address.
    #[error("page count {page_count} exceeds the bad-block index range of {max} blocks")]
    IndexRangeExceeded {
        /// Configured page count.
        page_count: u64,
        /// Largest page count the index supports.
        max: u64,
    },
    /// The error-rate exponent is outside `[-24, 0]`.
    #[error("error-rate exponent {0} is outside [-24, 0]")]
    ExponentOutOfRange(i32),
    /// No backing store exists for the configured identifier.
    #[error("backing store not found: {0}")]
    BackingStoreNotFound(String),
    /// The backing store could not be opened or inspected.
    #[error("backing store error: {0}")]
    BackingStore(#[source] io::Error),
}

/// Why a request failed.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request addresses blocks beyond the device capacity.
    #[error("request for {count} blocks at block {block} exceeds capacity of {capacity} blocks")]
    OutOfRange {
        /// First logical block of the request.
        block: u64,
        /// Number of blocks requested.
        count: u64,
        /// Device capacity in blocks.
        capacity: u64,
    },
    /// A block targeted by the read is marked bad.
    #[error("uncorrectable read error at block {block}")]
    ReadError {
        /// First bad block found in the request range.
        block: u64,
    },
    /// The caller's buffer is shorter than the request length.
    #[error("buffer holds {actual} bytes but the request needs {expected}")]
    InvalidBuffer {
        /// Bytes the request transfers.
        expected: usize,
        /// Bytes the caller supplied.
        actual: usize,
    },
    /// The backing store failed the transfer.
    #[error("backing store error: {0}")]
    BackingStore(#[from] io::Error),
}

/// Coarse classification of a [`RequestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// See [`RequestError::OutOfRange`].
    OutOfRange,
    /// See [`RequestError::ReadError`].
    ReadError,
    /// See [`RequestError::InvalidBuffer`].
    InvalidBuffer,
    /// See [`RequestError::BackingStore`].
    BackingStoreError,
}

impl RequestError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            RequestError::OutOfRange { .. } => FailureKind::OutOfRange,
            RequestError::ReadError { .. } => FailureKind::ReadError,
            RequestError::InvalidBuffer { .. } => FailureKind::InvalidBuffer,
            RequestError::BackingStore(_) => FailureKind::BackingStoreError,
        }
    }
}

/// Outcome of a single request: bytes transferred, or why it failed.
pub type Completion = Result<usize, RequestError>;
