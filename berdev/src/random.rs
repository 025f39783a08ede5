//! Random draw sources for fault injection.
//!
//! Fault injection only needs uniformly distributed 32-bit values, not
//! cryptographic strength. The device takes any [`RandomSource`], which
//! lets tests swap the production generator for a seeded or scripted one.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of uniformly distributed 32-bit draws.
///
/// Shared by every request in flight, so implementations must be usable
/// from several threads at once.
pub trait RandomSource: Send + Sync {
    /// Draw one uniformly distributed `u32`.
    fn draw32(&self) -> u32;
}

impl<R: RandomSource + ?Sized> RandomSource for std::sync::Arc<R> {
    fn draw32(&self) -> u32 {
        (**self).draw32()
    }
}

/// Production source backed by the thread-local `rand::rng()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomSource;

impl ThreadRandomSource {
    /// Create a new thread-local random source.
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for ThreadRandomSource {
    fn draw32(&self) -> u32 {
        rand::rng().random()
    }
}

/// Deterministic source: the same seed always yields the same sequence.
///
/// Draws are serialized through a lock, so the sequence is only reproducible
/// when the order of requests is.
#[derive(Debug)]
pub struct SeededRandomSource {
    seed: u64,
    rng: Mutex<ChaCha8Rng>,
}

impl SeededRandomSource {
    /// Create a source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Seed this source was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRandomSource {
    fn draw32(&self) -> u32 {
        self.rng.lock().random()
    }
}

/// Replays a fixed list of draws, wrapping around at the end.
///
/// Useful for pinning fault decisions in tests: with two draws per written
/// block, `[0, 0]` marks every block bad at any exponent and
/// `[u32::MAX, u32::MAX]` marks none bad unless the exponent is 0.
#[derive(Debug)]
pub struct ScriptedRandomSource {
    draws: Vec<u32>,
    next: AtomicUsize,
}

impl ScriptedRandomSource {
    /// Create a source replaying `draws`. An empty list always yields 0.
    pub fn new(draws: Vec<u32>) -> Self {
        Self {
            draws,
            next: AtomicUsize::new(0),
        }
    }

    /// Source whose draws always mark blocks bad.
    pub fn always_bad() -> Self {
        Self::new(vec![0])
    }

    /// Source whose draws mark blocks bad only at exponent 0.
    pub fn never_bad() -> Self {
        Self::new(vec![u32::MAX])
    }

    /// Number of draws taken so far.
    pub fn draws_taken(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl RandomSource for ScriptedRandomSource {
    fn draw32(&self) -> u32 {
        if self.draws.is_empty() {
            return 0;
        }
        let at = self.next.fetch_add(1, Ordering::Relaxed);
        self.draws[at % self.draws.len()]
    }
}
