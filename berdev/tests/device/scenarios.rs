//! End-to-end scenarios for the request path.
//!
//! These tests drive a device through its public API only and check the
//! externally observable contract: capacity, range checks, bad-block reads
//! and data round trips.

use berdev::{
    BerDevice, DeviceConfig, Direction, FailureKind, MemoryBackingStore, ScriptedRandomSource,
    SeededRandomSource, fault,
};

fn device_with(
    config: DeviceConfig,
    rng: ScriptedRandomSource,
) -> BerDevice<MemoryBackingStore, ScriptedRandomSource> {
    BerDevice::in_memory(config, rng).expect("device")
}

/// Exponent 0 marks every written block bad; each later read fails.
#[test]
fn test_exponent_zero_fails_every_read() {
    let config = DeviceConfig::always_fail().page_size(4096).page_count(10);
    let device = BerDevice::in_memory(config, SeededRandomSource::new(3)).expect("device");

    for block in 0..10 {
        device.write(block, &[block as u8; 4096]).expect("write");
    }
    assert_eq!(device.bad_block_count(), 10);

    let mut buf = vec![0u8; 4096];
    for block in 0..10 {
        let err = device.read(block, &mut buf).expect_err("bad block");
        assert_eq!(err.kind(), FailureKind::ReadError);
    }
    assert_eq!(device.stats().read_errors, 10);
}

/// At exponent -24 only the draw pairs inside the (0, 1) window are faults.
#[test]
fn test_minimum_exponent_draws() {
    assert!(fault::is_block_bad(-24, 0, 0));
    assert!(!fault::is_block_bad(-24, 0, 2));

    let config = DeviceConfig::never_fail().page_size(512).page_count(4);
    let device = device_with(config.clone(), ScriptedRandomSource::new(vec![0, 0]));
    device.write(0, &[1u8; 512]).expect("write");
    assert!(device.is_block_bad(0));

    let device = device_with(config, ScriptedRandomSource::new(vec![0, 2]));
    device.write(0, &[1u8; 512]).expect("write");
    assert!(!device.is_block_bad(0));
}

/// Unwritten blocks read back as the store's initial contents.
#[test]
fn test_unwritten_block_reads_initial_data() {
    let config = DeviceConfig::default().page_size(4096).page_count(10);
    let device = BerDevice::in_memory(config, SeededRandomSource::new(11)).expect("device");

    for block in 0..5 {
        device.write(block, &[0xEE; 4096]).expect("write");
    }
    assert_eq!(device.capacity(), 10);

    let mut buf = vec![0xFFu8; 4096];
    assert_eq!(device.read(9, &mut buf).expect("read"), 4096);
    assert_eq!(buf, vec![0u8; 4096]);
}

/// A request covering exactly the device succeeds; one block more does not.
#[test]
fn test_capacity_boundary() {
    let config = DeviceConfig::default().page_size(4096).page_count(10);
    let device = device_with(config, ScriptedRandomSource::never_bad());

    let mut whole = vec![0u8; 10 * 4096];
    assert_eq!(
        device
            .submit(Direction::Write, 0, 10, &mut whole)
            .expect("full write"),
        40960
    );
    assert_eq!(
        device
            .submit(Direction::Read, 0, 10, &mut whole)
            .expect("full read"),
        40960
    );

    let mut past = vec![0u8; 11 * 4096];
    let err = device
        .submit(Direction::Read, 0, 11, &mut past)
        .expect_err("past end");
    assert_eq!(err.kind(), FailureKind::OutOfRange);

    // one byte past the end is out of range, not a short buffer
    let mut one_past = vec![0u8; 10 * 4096 + 1];
    let err = device.read(0, &mut one_past).expect_err("past end");
    assert_eq!(err.kind(), FailureKind::OutOfRange);
    let err = device.write(0, &one_past).expect_err("past end");
    assert_eq!(err.kind(), FailureKind::OutOfRange);

    // a partial block inside the device is a buffer error
    let mut partial = vec![0u8; 9 * 4096 + 1];
    let err = device.read(0, &mut partial).expect_err("partial block");
    assert_eq!(err.kind(), FailureKind::InvalidBuffer);

    let mut last = vec![0u8; 4096];
    assert!(device.submit(Direction::Read, 9, 1, &mut last).is_ok());
    let err = device
        .submit(Direction::Read, 10, 1, &mut last)
        .expect_err("past end");
    assert_eq!(err.kind(), FailureKind::OutOfRange);
    assert_eq!(device.stats().out_of_range, 4);
}

/// Data written to a good block reads back unchanged.
#[test]
fn test_round_trip_multi_block() {
    let config = DeviceConfig::default().page_size(1024).page_count(64);
    let device = device_with(config, ScriptedRandomSource::never_bad());

    let data: Vec<u8> = (0..8 * 1024).map(|i| (i * 7 % 256) as u8).collect();
    device.write(20, &data).expect("write");

    let mut buf = vec![0u8; data.len()];
    device.read(20, &mut buf).expect("read");
    assert_eq!(buf, data);

    let stats = device.stats();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.reads, 1);
    assert_eq!(stats.bytes_written, 8192);
    assert_eq!(stats.bytes_read, 8192);
}

/// A write that marks a block bad still stores its data.
#[test]
fn test_bad_write_still_reaches_store() {
    let config = DeviceConfig::always_fail().page_size(512).page_count(4);
    let device = device_with(config, ScriptedRandomSource::never_bad());
    device.write(1, &[0x3C; 512]).expect("write");

    let raw = device.backing_store().snapshot();
    assert!(raw[512..1024].iter().all(|&b| b == 0x3C));

    let store = device.into_backing_store();
    assert_eq!(store.snapshot()[512], 0x3C);
}

/// Bad marks last until the next write of the block, not forever.
#[test]
fn test_bad_mark_is_last_write_wins() {
    let config = DeviceConfig::always_fail().page_size(512).page_count(4);
    let device = device_with(config, ScriptedRandomSource::never_bad());
    device.write(2, &[1u8; 512]).expect("write");

    let mut buf = vec![0u8; 512];
    for _ in 0..3 {
        assert!(device.read(2, &mut buf).is_err());
    }

    device.set_error_rate_exponent(-24);
    device.write(2, &[5u8; 512]).expect("write");
    device.read(2, &mut buf).expect("read");
    assert_eq!(buf, vec![5u8; 512]);
}

/// A large sparse device only tracks what was written bad.
#[test]
fn test_large_device_sparse_marks() {
    let config = DeviceConfig::always_fail()
        .page_size(512)
        .page_count(3_000_000_000);
    let store = MemoryBackingStore::new(4, 512);
    // the store is far too small for this geometry
    assert!(BerDevice::new(config.clone(), store, ScriptedRandomSource::never_bad()).is_err());

    let mut index = berdev::SparseBitIndex::new();
    for block in [0u64, 1_000_000, 2_999_999_999] {
        index.set(block);
    }
    assert_eq!(index.count_set(), 3);
    assert!(index.allocated_nodes() < 20);
    assert!(config.validate().is_ok());
}
