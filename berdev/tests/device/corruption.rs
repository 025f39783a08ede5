//! Tests for the corrupted-data read mode.

use berdev::{BerDevice, CorruptionMode, DeviceConfig, ScriptedRandomSource};

fn bit_differences(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Bad blocks in a multi-block read are corrupted; good ones are untouched.
#[test]
fn test_only_bad_blocks_corrupted() {
    let config = DeviceConfig::default()
        .page_size(1024)
        .page_count(8)
        .corruption_mode(CorruptionMode::ReturnCorruptData);
    // blocks 0 and 2 good, block 1 bad
    let rng = ScriptedRandomSource::new(vec![u32::MAX, u32::MAX, 0, 0, u32::MAX, u32::MAX]);
    let device = BerDevice::in_memory(config, rng).expect("device");

    let data: Vec<u8> = (0..3 * 1024).map(|i| (i % 199) as u8).collect();
    device.write(0, &data).expect("write");
    assert_eq!(device.bad_block_count(), 1);

    let mut buf = vec![0u8; data.len()];
    assert_eq!(device.read(0, &mut buf).expect("read"), 3072);

    assert_eq!(&buf[..1024], &data[..1024]);
    assert_eq!(bit_differences(&buf[1024..2048], &data[1024..2048]), 1);
    assert_eq!(&buf[2048..], &data[2048..]);
}

/// Retrying a corrupted read returns the same corruption.
#[test]
fn test_corruption_is_stable_until_rewrite() {
    let config = DeviceConfig::always_fail()
        .page_size(512)
        .page_count(4)
        .corruption_mode(CorruptionMode::ReturnCorruptData);
    let device = BerDevice::in_memory(config, ScriptedRandomSource::never_bad()).expect("device");
    device.write(3, &[0x0F; 512]).expect("write");

    let mut first = vec![0u8; 512];
    let mut second = vec![0u8; 512];
    device.read(3, &mut first).expect("read");
    device.read(3, &mut second).expect("read");
    assert_eq!(first, second);
    assert_ne!(first, vec![0x0F; 512]);

    device.set_error_rate_exponent(-24);
    device.write(3, &[0x0F; 512]).expect("rewrite");
    device.read(3, &mut first).expect("read");
    assert_eq!(first, vec![0x0F; 512]);
}

/// The stored bytes stay pristine; corruption only exists on the read path.
#[test]
fn test_store_keeps_pristine_bytes() {
    let config = DeviceConfig::always_fail()
        .page_size(512)
        .page_count(2)
        .corruption_mode(CorruptionMode::ReturnCorruptData);
    let device = BerDevice::in_memory(config, ScriptedRandomSource::never_bad()).expect("device");
    device.write(0, &[0x77; 512]).expect("write");

    let mut buf = vec![0u8; 512];
    device.read(0, &mut buf).expect("read");
    assert_eq!(bit_differences(&buf, &[0x77; 512]), 1);
    assert!(device.backing_store().snapshot()[..512].iter().all(|&b| b == 0x77));

    let stats = device.stats();
    assert_eq!(stats.corrupted_reads, 1);
    assert_eq!(stats.read_errors, 0);
}
