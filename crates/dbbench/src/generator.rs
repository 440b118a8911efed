//! Synthetic value generator with controllable compressibility.
//!
//! A single buffer of at least [`BUFFER_SIZE`] bytes is built once from a
//! fixed seed; values are served as slices of it so the hot path never
//! allocates, and the compressed size of the generated data is identical
//! from run to run.

// Fragment sizing truncates ratio * length towards zero.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Minimum size of the pre-built buffer; also the largest value that can be generated.
pub const BUFFER_SIZE: usize = 1 << 20;

/// Length of each compressibility-controlled fragment.
const FRAGMENT_LEN: usize = 100;

const SEED: u64 = 301;

/// Append `len` bytes to `out` that compress to roughly `ratio * len` bytes.
///
/// A random printable run of `max(1, ratio * len)` bytes is repeated until
/// the fragment is `len` bytes long.
pub fn compressible_fragment(rng: &mut impl Rng, ratio: f64, len: usize, out: &mut Vec<u8>) {
    let raw_len = ((len as f64 * ratio) as usize).max(1);
    let raw: Vec<u8> = (0..raw_len).map(|_| rng.random_range(b' '..=b'~')).collect();

    let mut remaining = len;
    while remaining > 0 {
        let take = remaining.min(raw_len);
        out.extend_from_slice(&raw[..take]);
        remaining -= take;
    }
}

/// Serves value bytes from a pre-built, deterministic buffer.
pub struct RandomGenerator {
    data: Vec<u8>,
    pos: usize,
}

impl RandomGenerator {
    pub fn new(compression_ratio: f64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let mut data = Vec::with_capacity(BUFFER_SIZE + FRAGMENT_LEN);
        while data.len() < BUFFER_SIZE {
            compressible_fragment(&mut rng, compression_ratio, FRAGMENT_LEN, &mut data);
        }
        Self { data, pos: 0 }
    }

    /// Size of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The whole underlying buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Next `len` bytes, wrapping to the start of the buffer when the slice
    /// would run past its end.
    ///
    /// # Panics
    ///
    /// If `len` exceeds [`RandomGenerator::capacity`].
    pub fn generate(&mut self, len: usize) -> &[u8] {
        if self.pos + len > self.data.len() {
            self.pos = 0;
            assert!(
                len <= self.data.len(),
                "requested {len} bytes from a {} byte generator",
                self.data.len()
            );
        }
        self.pos += len;
        &self.data[self.pos - len..self.pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest period `p` such that `fragment[i] == fragment[i % p]`.
    fn period(fragment: &[u8]) -> usize {
        (1..=fragment.len())
            .find(|&p| fragment.iter().enumerate().all(|(i, b)| *b == fragment[i % p]))
            .unwrap_or(fragment.len())
    }

    #[test]
    fn test_buffer_reaches_minimum_size() {
        let generator = RandomGenerator::new(0.5);
        assert!(generator.capacity() >= BUFFER_SIZE);
        assert!(generator.capacity() < BUFFER_SIZE + FRAGMENT_LEN);
        assert!(generator.data().iter().all(|b| (b' '..=b'~').contains(b)));
    }

    #[test]
    fn test_same_seed_same_bytes() {
        let a = RandomGenerator::new(0.5);
        let b = RandomGenerator::new(0.5);
        assert_eq!(a.data(), b.data());

        let c = RandomGenerator::new(0.25);
        assert_ne!(a.data(), c.data());
    }

    #[test]
    fn test_fragment_period_follows_ratio() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut out = Vec::new();
        compressible_fragment(&mut rng, 0.25, 100, &mut out);
        assert_eq!(out.len(), 100);
        assert!(period(&out) <= 25);

        out.clear();
        compressible_fragment(&mut rng, 0.0, 10, &mut out);
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|b| *b == out[0]));
    }

    #[test]
    fn test_generate_wraps_to_start() {
        let mut generator = RandomGenerator::new(0.5);
        let capacity = generator.capacity();
        let head = generator.data()[..100].to_vec();

        generator.generate(capacity - 50);
        let wrapped = generator.generate(100).to_vec();
        assert_eq!(wrapped, head);
    }

    #[test]
    fn test_generate_whole_buffer() {
        let mut generator = RandomGenerator::new(0.5);
        let capacity = generator.capacity();
        generator.generate(10);
        assert_eq!(generator.generate(capacity).len(), capacity);
    }

    #[test]
    #[should_panic(expected = "byte generator")]
    fn test_generate_rejects_oversized_request() {
        let mut generator = RandomGenerator::new(0.5);
        let too_big = generator.capacity() + 1;
        generator.generate(too_big);
    }
}
