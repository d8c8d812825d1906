//! Deterministic, string-seeded pseudo-random number generation.
//!
//! Both the interactive diffusion engine and the fitness evaluations of the
//! genetic optimizer draw from [`SeededRandom`]. Two instances built from the
//! same non-empty seed produce the same sequence, so a fixed seed, graph and
//! message always yield the same propagation outcomes.
//!
//! The generator is a 32-bit linear congruential generator:
//!
//! - **Seeding**: `hash = hash * 31 + unit` over the seed's UTF-16 code units,
//!   wrapped to a signed 32-bit integer, then made non-negative.
//! - **Advance**: `state = (MULTIPLIER * state + INCREMENT) mod 2^32`.
//! - **Output**: `state / 2^32`, always in `[0, 1)`.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// LCG multiplier shared by every instance.
const MULTIPLIER: u64 = 1_664_525;

/// LCG increment shared by every instance.
const INCREMENT: u64 = 1_013_904_223;

/// LCG modulus (2^32).
const MODULUS: u64 = 1 << 32;

/// Rolling string hash used to derive an initial state from a seed.
#[derive(Default)]
struct SeedHasher {
    hash: i32,
}

impl SeedHasher {
    #[inline]
    fn write_unit(&mut self, unit: u16) {
        self.hash = self
            .hash
            .wrapping_shl(5)
            .wrapping_sub(self.hash)
            .wrapping_add(i32::from(unit));
    }

    /// Absolute value of the hash; `i32::MIN` maps to 2^31.
    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.hash.unsigned_abs())
    }
}

/// Hash a non-empty seed string into an initial LCG state.
#[must_use]
pub fn seed_state(seed: &str) -> u64 {
    let mut hasher = SeedHasher::default();
    for unit in seed.encode_utf16() {
        hasher.write_unit(unit);
    }
    hasher.finish()
}

/// A seeded linear congruential generator producing floats in `[0, 1)`.
///
/// An empty seed falls back to a random initial state and is therefore not
/// reproducible. Callers that need determinism must supply a non-empty seed.
///
/// `SeededRandom` also implements [`RngCore`], so it can drive any code
/// written against [`rand::Rng`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    /// Create a generator from a seed string.
    #[must_use]
    pub fn new(seed: &str) -> Self {
        if seed.is_empty() {
            let state = u64::from(rand::rng().next_u32());
            tracing::debug!(state, "empty seed, using non-reproducible state");
            return Self { state };
        }
        Self {
            state: seed_state(seed),
        }
    }

    /// Create a generator from a raw initial state (reduced modulo 2^32).
    #[must_use]
    pub const fn from_state(state: u64) -> Self {
        Self {
            state: state % MODULUS,
        }
    }

    /// Current internal state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn advance(&mut self) -> u64 {
        self.state = (MULTIPLIER * self.state + INCREMENT) % MODULUS;
        self.state
    }

    /// Advance the generator and return the next value in `[0, 1)`.
    #[inline]
    #[allow(clippy::cast_precision_loss)] // state < 2^32 is exact in f64
    pub fn next_f64(&mut self) -> f64 {
        self.advance() as f64 / MODULUS as f64
    }
}

impl RngCore for SeededRandom {
    #[inline]
    #[allow(clippy::cast_possible_truncation)] // state < 2^32
    fn next_u32(&mut self) -> u32 {
        self.advance() as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
