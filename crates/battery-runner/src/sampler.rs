//! Random selection of the next test case and its reproduction seed.

use crate::registry::Registry;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Seeds handed to test cases are drawn from `[1, 100_000)`; they are small
/// enough to retype from a log line by hand.
pub const SEED_RANGE: std::ops::Range<u64> = 1..100_000;

#[derive(Debug)]
pub struct Sampler {
    rng: ChaCha20Rng,
}

impl Sampler {
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Fixed-seed sampler: the whole session's selection sequence becomes
    /// reproducible.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Draw a suite uniformly, then a case within it uniformly.
    ///
    /// This is deliberately not a flat draw over all (suite, case) pairs:
    /// cases in small suites are selected more often per-case than cases in
    /// large ones. The original battery sampled this way and it is unclear
    /// whether the bias was intentional, so it is preserved rather than
    /// corrected.
    pub fn sample<'r>(&mut self, registry: &'r Registry) -> (&'r str, &'r str) {
        let suites = registry.suite_names();
        let suite = suites[self.rng.gen_range(0..suites.len())];
        let cases = registry
            .cases(suite)
            .unwrap_or_else(|| unreachable!("sampled suite always resolves"));
        let case = &cases[self.rng.gen_range(0..cases.len())];
        (suite, case.name)
    }

    /// Fresh per-iteration seed, drawn independently each time; collisions
    /// across a long session are permitted.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen_range(SEED_RANGE)
    }
}
