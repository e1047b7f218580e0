//! Deterministic multiply-with-carry generator used for weight initialization.
//!
//! Two 32-bit words are stepped independently and combined into one output:
//! ```text
//! z = |36969 * (z & 0xFFFF) + (z >> 16)|
//! w = |18000 * (w & 0xFFFF) + (w >> 16)|
//! out = |(z << 16) + w|
//! ```
//! All arithmetic is wrapping two's-complement `i32` with arithmetic right
//! shift, and `|x|` is a wrapping absolute value (`|i32::MIN| == i32::MIN`).
//! Same seeds and same call order give a bit-identical stream on every
//! platform, which is why this is used instead of a `rand` generator.

/// Default seed for the `z` word.
pub const DEFAULT_SEED_Z: i32 = 12345;
/// Default seed for the `w` word.
pub const DEFAULT_SEED_W: i32 = 45678;

/// Stateful two-word multiply-with-carry generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplyWithCarry {
    z: i32,
    w: i32,
}

impl MultiplyWithCarry {
    /// Create a generator from explicit seed words.
    #[must_use]
    pub fn new(z: i32, w: i32) -> Self {
        Self { z, w }
    }

    /// Current `(z, w)` state.
    #[must_use]
    pub fn state(&self) -> (i32, i32) {
        (self.z, self.w)
    }

    /// Advance both words and return the next value.
    pub fn next_i32(&mut self) -> i32 {
        self.z = step(self.z, 36969);
        self.w = step(self.w, 18000);
        (self.z << 16).wrapping_add(self.w).wrapping_abs()
    }

    /// Next weight in `[-1.0, 1.0)`: `(next % 2000) / 1000 - 1`.
    ///
    /// The remainder is taken on the signed value (truncating), matching the
    /// integer semantics of the stream itself.
    pub fn next_weight(&mut self) -> f64 {
        f64::from(self.next_i32() % 2000) / 1000.0 - 1.0
    }
}

impl Default for MultiplyWithCarry {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_Z, DEFAULT_SEED_W)
    }
}

impl Iterator for MultiplyWithCarry {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        Some(self.next_i32())
    }
}

#[inline]
fn step(word: i32, multiplier: i32) -> i32 {
    multiplier
        .wrapping_mul(word & 0xFFFF)
        .wrapping_add(word >> 16)
        .wrapping_abs()
}
