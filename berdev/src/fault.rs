//! Probabilistic bad-block decision.
//!
//! The error rate is configured as an exponent `e` in `[-24, 0]`: a written
//! block goes bad with probability close to `10^e`. A single 32-bit draw
//! cannot resolve probabilities below `2^-32`, so the decision takes two
//! independent draws and compares each against its own half of a threshold
//! pair. A block is bad when both draws fall inside their window, which
//! happens with probability `(high + 1) * (low + 1) / 2^64`.
//!
//! | exponent | probability | exponent | probability |
//! |----------|-------------|----------|-------------|
//! | 0        | 1           | -14      | 1.0e-14     |
//! | -1       | 1.0e-1      | -16      | 1.0e-16     |
//! | -6       | 1.0e-6      | -18      | 1.1e-18     |
//! | -10      | 1.0e-10     | -19..-24 | 1.1e-19     |
//!
//! Below `-18` the two-word resolution floor is reached and every row is
//! `(0, 1)`.

/// Smallest accepted error-rate exponent.
pub const MIN_EXPONENT: i32 = -24;

/// Largest accepted error-rate exponent.
pub const MAX_EXPONENT: i32 = 0;

/// A pair of 32-bit windows; a draw pair at or below both is a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    /// Window for the first draw.
    pub high: u32,
    /// Window for the second draw.
    pub low: u32,
}

impl Threshold {
    const fn new(high: u32, low: u32) -> Self {
        Self { high, low }
    }

    /// Whether the draw pair falls inside both windows.
    pub fn contains(&self, draw1: u32, draw2: u32) -> bool {
        draw1 <= self.high && draw2 <= self.low
    }

    /// Probability that two uniform draws fall inside both windows.
    pub fn probability(&self) -> f64 {
        const WORD: f64 = 4_294_967_296.0;
        (f64::from(self.high) + 1.0) / WORD * ((f64::from(self.low) + 1.0) / WORD)
    }
}

/// Thresholds indexed by `-exponent`.
///
/// Row `k` satisfies `(high + 1) * (low + 1) ≈ 2^64 * 10^-k`. Rows are
/// non-increasing in both words.
pub static THRESHOLDS: [Threshold; 25] = [
    Threshold::new(0xffff_ffff, 0xffff_ffff),
    Threshold::new(0x50f4_4d88, 0x50f4_4d88),
    Threshold::new(0x1999_9999, 0x1999_9998),
    Threshold::new(0x0818_6e26, 0x0818_6e27),
    Threshold::new(0x028f_5c28, 0x028f_5c28),
    Threshold::new(0x00cf_3e36, 0x00cf_3e36),
    Threshold::new(0x0041_8936, 0x0041_8937),
    Threshold::new(0x0014_b96b, 0x0014_b96b),
    Threshold::new(0x0006_8db8, 0x0006_8db7),
    Threshold::new(0x0002_128a, 0x0002_128a),
    Threshold::new(0x0000_a7c5, 0x0000_a7c4),
    Threshold::new(0x0000_350d, 0x0000_350d),
    Threshold::new(0x0000_10c6, 0x0000_10c6),
    Threshold::new(0x0000_054d, 0x0000_054d),
    Threshold::new(0x0000_01ac, 0x0000_01ad),
    Threshold::new(0x0000_0087, 0x0000_0087),
    Threshold::new(0x0000_002a, 0x0000_002a),
    Threshold::new(0x0000_000d, 0x0000_000c),
    Threshold::new(0x0000_0003, 0x0000_0004),
    Threshold::new(0x0000_0000, 0x0000_0001),
    Threshold::new(0x0000_0000, 0x0000_0001),
    Threshold::new(0x0000_0000, 0x0000_0001),
    Threshold::new(0x0000_0000, 0x0000_0001),
    Threshold::new(0x0000_0000, 0x0000_0001),
    Threshold::new(0x0000_0000, 0x0000_0001),
];

/// Clamp an exponent into `[MIN_EXPONENT, MAX_EXPONENT]`.
pub fn clamp_exponent(exponent: i32) -> i32 {
    exponent.clamp(MIN_EXPONENT, MAX_EXPONENT)
}

/// Threshold row used for `exponent` (clamped).
pub fn threshold_for(exponent: i32) -> Threshold {
    THRESHOLDS[clamp_exponent(exponent).unsigned_abs() as usize]
}

/// Decide whether a freshly written block goes bad.
///
/// Pure: the randomness comes entirely from `draw1` and `draw2`, which the
/// caller samples uniformly.
pub fn is_block_bad(exponent: i32, draw1: u32, draw2: u32) -> bool {
    threshold_for(exponent).contains(draw1, draw2)
}
