//! Binary target for a multi-threaded soak run against an in-memory device.
//!
//! Usage: `ber_soak [exponent] [seed]`. Each worker writes and reads random
//! block ranges and checks that every successful read returns the bytes last
//! written. Exits non-zero on a data mismatch.

use berdev::{BerDevice, DeviceConfig, FailureKind, SeededRandomSource};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

const WORKERS: u64 = 4;
const OPS_PER_WORKER: u64 = 20_000;
const BLOCKS_PER_WORKER: u64 = 256;
const PAGE_SIZE: u32 = 4096;

fn parse_arg<T: std::str::FromStr>(position: usize, default: T) -> T {
    std::env::args()
        .nth(position)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// Fill pattern derived from the block and its write generation.
fn pattern(block: u64, generation: u64) -> u8 {
    (block.wrapping_mul(31) ^ generation) as u8
}

fn main() {
    tracing_subscriber::fmt::init();

    let exponent: i32 = parse_arg(1, -2);
    let seed: u64 = parse_arg(2, 42);

    let config = DeviceConfig::default()
        .page_size(PAGE_SIZE)
        .page_count(WORKERS * BLOCKS_PER_WORKER)
        .error_rate_exponent(exponent);
    let device = match BerDevice::in_memory(config, SeededRandomSource::new(seed)) {
        Ok(device) => device,
        Err(e) => {
            eprintln!("ERROR: {e}");
            process::exit(2);
        }
    };

    let mismatches = AtomicU64::new(0);

    std::thread::scope(|scope| {
        for worker in 0..WORKERS {
            let device = &device;
            let mismatches = &mismatches;
            scope.spawn(move || {
                // each worker owns a disjoint block range so it can check contents
                let first = worker * BLOCKS_PER_WORKER;
                let mut generations = vec![0u64; BLOCKS_PER_WORKER as usize];
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(worker));
                let mut buf = vec![0u8; PAGE_SIZE as usize];

                for _ in 0..OPS_PER_WORKER {
                    let slot = rng.random_range(0..BLOCKS_PER_WORKER);
                    let block = first + slot;
                    if rng.random_bool(0.5) {
                        let generation = generations[slot as usize] + 1;
                        buf.fill(pattern(block, generation));
                        if device.write(block, &buf).is_ok() {
                            generations[slot as usize] = generation;
                        }
                    } else {
                        match device.read(block, &mut buf) {
                            Ok(_) => {
                                let expected = match generations[slot as usize] {
                                    0 => 0,
                                    g => pattern(block, g),
                                };
                                if buf.iter().any(|&b| b != expected) {
                                    mismatches.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(e) if e.kind() == FailureKind::ReadError => {}
                            Err(e) => {
                                eprintln!("worker {worker}: unexpected failure: {e}");
                                mismatches.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
            });
        }
    });

    let stats = device.stats();
    eprintln!("exponent {exponent}, seed {seed}");
    eprintln!("{stats}");
    eprintln!("blocks currently bad: {}", device.bad_block_count());

    let mismatches = mismatches.load(Ordering::Relaxed);
    if mismatches > 0 {
        eprintln!("ERROR: {mismatches} reads returned unexpected data");
        process::exit(1);
    }
}
