//! Seedable randomness for every stochastic decision in a run.

use rand::prelude::*;

/// Random number generator wrapper for evolution.
///
/// Implements [`RngCore`], so it can be handed to operators as
/// `&mut dyn RngCore` and used with every [`Rng`] helper.
#[derive(Debug, Clone)]
pub struct EvolutionRng {
    rng: StdRng,
}

impl EvolutionRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    /// True with probability `p`. `p >= 1` is always true, `p <= 0` never.
    pub fn chance(&mut self, p: f32) -> bool {
        self.unit() < p
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Independent child generator, deterministic given this one's state.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_seed())
    }
}

impl RngCore for EvolutionRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
