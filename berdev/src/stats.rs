//! I/O and fault counters for a device.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed atomics from every request.
#[derive(Debug, Default)]
pub struct DeviceStats {
    reads: AtomicU64,
    writes: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    blocks_marked_bad: AtomicU64,
    read_errors: AtomicU64,
    corrupted_reads: AtomicU64,
    out_of_range: AtomicU64,
    backing_errors: AtomicU64,
}

/// Point-in-time copy of [`DeviceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Read requests that completed successfully.
    pub reads: u64,
    /// Write requests that completed successfully.
    pub writes: u64,
    /// Bytes returned to callers.
    pub bytes_read: u64,
    /// Bytes forwarded to the backing store by writes.
    pub bytes_written: u64,
    /// Blocks a write marked bad.
    pub blocks_marked_bad: u64,
    /// Reads failed because a block was bad.
    pub read_errors: u64,
    /// Reads served with corrupted bytes.
    pub corrupted_reads: u64,
    /// Requests rejected for addressing past the device end.
    pub out_of_range: u64,
    /// Requests failed by the backing store.
    pub backing_errors: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl DeviceStats {
    pub(crate) fn record_read(&self, bytes: usize) {
        bump(&self.reads, 1);
        bump(&self.bytes_read, bytes as u64);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        bump(&self.writes, 1);
        bump(&self.bytes_written, bytes as u64);
    }

    pub(crate) fn record_marked_bad(&self, blocks: u64) {
        bump(&self.blocks_marked_bad, blocks);
    }

    pub(crate) fn record_read_error(&self) {
        bump(&self.read_errors, 1);
    }

    pub(crate) fn record_corrupted_read(&self) {
        bump(&self.corrupted_reads, 1);
    }

    pub(crate) fn record_out_of_range(&self) {
        bump(&self.out_of_range, 1);
    }

    pub(crate) fn record_backing_error(&self) {
        bump(&self.backing_errors, 1);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            blocks_marked_bad: self.blocks_marked_bad.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            corrupted_reads: self.corrupted_reads.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            backing_errors: self.backing_errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "reads:             {}", self.reads)?;
        writeln!(f, "writes:            {}", self.writes)?;
        writeln!(f, "bytes read:        {}", self.bytes_read)?;
        writeln!(f, "bytes written:     {}", self.bytes_written)?;
        writeln!(f, "blocks marked bad: {}", self.blocks_marked_bad)?;
        writeln!(f, "read errors:       {}", self.read_errors)?;
        writeln!(f, "corrupted reads:   {}", self.corrupted_reads)?;
        writeln!(f, "out of range:      {}", self.out_of_range)?;
        write!(f, "backing errors:    {}", self.backing_errors)
    }
}
