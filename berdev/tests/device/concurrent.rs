//! Concurrent request tests.
//!
//! These tests verify that requests submitted from several threads see a
//! consistent bad-block state and never observe half-applied writes.

use berdev::{BerDevice, DeviceConfig, FailureKind, SeededRandomSource, ThreadRandomSource};
use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, Ordering};

const PAGE: usize = 4096;

/// A read racing a bad-marking write sees the block entirely before or
/// entirely after that write.
#[test]
fn test_read_racing_write_same_block() {
    for round in 0..200u64 {
        let config = DeviceConfig::default().page_size(PAGE as u32).page_count(10);
        let device = BerDevice::in_memory(config, SeededRandomSource::new(round)).expect("device");

        device.set_error_rate_exponent(-24);
        device.write(5, &[0xA1; PAGE]).expect("initial write");
        assert!(!device.is_block_bad(5));
        device.set_error_rate_exponent(0);

        let barrier = Barrier::new(2);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                device.write(5, &[0xB2; PAGE]).expect("racing write");
            });
            scope.spawn(|| {
                barrier.wait();
                let mut buf = vec![0u8; PAGE];
                match device.read(5, &mut buf) {
                    Ok(n) => {
                        assert_eq!(n, PAGE);
                        let first = buf[0];
                        assert!(first == 0xA1 || first == 0xB2, "unexpected byte {first:#x}");
                        assert!(buf.iter().all(|&b| b == first), "torn data");
                    }
                    Err(e) => assert_eq!(e.kind(), FailureKind::ReadError),
                }
            });
        });

        // once the write has completed, its outcome is visible
        let mut buf = vec![0u8; PAGE];
        let err = device.read(5, &mut buf).expect_err("block is bad");
        assert_eq!(err.kind(), FailureKind::ReadError);
    }
}

/// A multi-block write updates all of its blocks at once.
#[test]
fn test_multi_block_update_is_not_torn() {
    let config = DeviceConfig::always_fail().page_size(512).page_count(64);
    let device = BerDevice::in_memory(config, ThreadRandomSource::new()).expect("device");
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..500 {
                device.set_error_rate_exponent(0);
                device.write(8, &[1u8; 16 * 512]).expect("write bad");
                device.set_error_rate_exponent(-24);
                device.write(8, &[2u8; 16 * 512]).expect("write good");
            }
            done.store(true, Ordering::Release);
        });
        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                let bad = device.bad_block_count();
                assert!(bad == 0 || bad == 16, "observed {bad} bad blocks");
            }
        });
    });
}

/// Many writers on disjoint ranges all read back their own data.
#[test]
fn test_parallel_disjoint_round_trips() {
    let config = DeviceConfig::never_fail().page_size(512).page_count(8 * 32);
    let device = BerDevice::in_memory(config, SeededRandomSource::new(9)).expect("device");

    std::thread::scope(|scope| {
        for worker in 0..8u64 {
            let device = &device;
            scope.spawn(move || {
                let first = worker * 32;
                for block in first..first + 32 {
                    let fill = (block % 251) as u8;
                    device.write(block, &[fill; 512]).expect("write");
                }
                let mut buf = vec![0u8; 512];
                for block in first..first + 32 {
                    device.read(block, &mut buf).expect("read");
                    assert!(buf.iter().all(|&b| b == (block % 251) as u8));
                }
            });
        }
    });

    let stats = device.stats();
    assert_eq!(stats.writes, 256);
    assert_eq!(stats.reads, 256);
    assert_eq!(device.bad_block_count(), 0);
}
