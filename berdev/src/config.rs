//! # Device Configuration
//!
//! | Parameter | Field | Default | Description |
//! |-----------|-------|---------|-------------|
//! | Page size | `page_size` | 4096 | Logical block size in bytes |
//! | Page count | `page_count` | 10 | Device capacity in logical blocks |
//! | Error rate | `error_rate_exponent` | -14 | Written block goes bad with probability `10^e` |
//! | Bad read behavior | `corruption_mode` | `IoError` | Fail the read, or return corrupted bytes |
//! | Backing store | `backing_store` | `"memory"` | Identifier resolved by a [`BackingStoreProvider`] |
//!
//! The configuration is immutable once a device is built, except for the
//! error rate and corruption mode which the device exposes as runtime knobs.
//!
//! ```rust
//! use berdev::{CorruptionMode, DeviceConfig};
//!
//! let config = DeviceConfig::new("disk0")
//!     .page_size(4096)
//!     .page_count(1024)
//!     .error_rate_exponent(-6)
//!     .corruption_mode(CorruptionMode::ReturnCorruptData);
//! assert_eq!(config.capacity_bytes(), Some(4096 * 1024));
//! ```
//!
//! [`BackingStoreProvider`]: crate::storage::BackingStoreProvider

use crate::error::ConstructionError;
use crate::fault::{MAX_EXPONENT, MIN_EXPONENT};
use crate::index;
use serde::{Deserialize, Serialize};

/// What a read of a bad block does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionMode {
    /// Fail the whole request with a read error and transfer nothing.
    #[default]
    IoError,
    /// Complete the request successfully with corrupted bytes in bad blocks.
    ReturnCorruptData,
}

impl CorruptionMode {
    pub(crate) fn to_raw(self) -> u8 {
        match self {
            CorruptionMode::IoError => 0,
            CorruptionMode::ReturnCorruptData => 1,
        }
    }

    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            1 => CorruptionMode::ReturnCorruptData,
            _ => CorruptionMode::IoError,
        }
    }
}

/// Configuration for one emulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Logical block size in bytes. Must be a multiple of the backing
    /// store's native sector size.
    pub page_size: u32,

    /// Number of logical blocks.
    pub page_count: u64,

    /// Base-10 exponent of the per-write bad-block probability, in `[-24, 0]`.
    pub error_rate_exponent: i32,

    /// Behavior when a read touches a bad block.
    pub corruption_mode: CorruptionMode,

    /// Identifier of the backing store.
    pub backing_store: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            page_count: 10,
            error_rate_exponent: -14,
            corruption_mode: CorruptionMode::IoError,
            backing_store: "memory".to_string(),
        }
    }
}

impl DeviceConfig {
    /// Default configuration backed by the store named `backing_store`.
    pub fn new(backing_store: impl Into<String>) -> Self {
        Self {
            backing_store: backing_store.into(),
            ..Self::default()
        }
    }

    /// Every write marks its blocks bad.
    pub fn always_fail() -> Self {
        Self::default().error_rate_exponent(MAX_EXPONENT)
    }

    /// Lowest error rate the fault model can express (about `1.1e-19`).
    pub fn never_fail() -> Self {
        Self::default().error_rate_exponent(MIN_EXPONENT)
    }

    /// Set the page size.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the page count.
    pub fn page_count(mut self, page_count: u64) -> Self {
        self.page_count = page_count;
        self
    }

    /// Set the error-rate exponent.
    pub fn error_rate_exponent(mut self, exponent: i32) -> Self {
        self.error_rate_exponent = exponent;
        self
    }

    /// Set the corruption mode.
    pub fn corruption_mode(mut self, mode: CorruptionMode) -> Self {
        self.corruption_mode = mode;
        self
    }

    /// Set the backing store identifier.
    pub fn backing_store(mut self, identifier: impl Into<String>) -> Self {
        self.backing_store = identifier.into();
        self
    }

    /// Device size in bytes, or `None` on overflow.
    pub fn capacity_bytes(&self) -> Option<u64> {
        self.page_count.checked_mul(u64::from(self.page_size))
    }

    /// Check the configuration on its own.
    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.page_size == 0 {
            return Err(ConstructionError::PageSizeZero);
        }
        if self.page_count == 0 {
            return Err(ConstructionError::PageCountZero);
        }
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&self.error_rate_exponent) {
            return Err(ConstructionError::ExponentOutOfRange(
                self.error_rate_exponent,
            ));
        }
        if self.page_count > index::CAPACITY {
            return Err(ConstructionError::IndexRangeExceeded {
                page_count: self.page_count,
                max: index::CAPACITY,
            });
        }
        Ok(())
    }

    /// Check the configuration against a backing store's geometry.
    pub fn validate_against(
        &self,
        sector_size: u32,
        available_bytes: u64,
    ) -> Result<(), ConstructionError> {
        self.validate()?;
        if sector_size == 0 || self.page_size % sector_size != 0 {
            return Err(ConstructionError::PageSizeNotSectorMultiple {
                page_size: self.page_size,
                sector_size,
            });
        }
        let required = self
            .capacity_bytes()
            .ok_or(ConstructionError::CapacityExceeded {
                required: u64::MAX,
                available: available_bytes,
            })?;
        if required > available_bytes {
            return Err(ConstructionError::CapacityExceeded {
                required,
                available: available_bytes,
            });
        }
        Ok(())
    }
}
