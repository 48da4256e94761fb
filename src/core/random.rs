//! Shared random source for connectivity sampling and external noise.
//!
//! The source is an explicit context object passed to whoever needs randomness, rather than
//! process-wide state. Tests inject a seed; [`RandomSource::fork`] derives independent streams from the same seed,
//! e.g. to keep the external noise apart from the connectivity draws.
use derivative::Derivative;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use std::ops::Range;

use crate::error::SNNError;

/// A seeded random number generator with a cached Poisson distribution.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RandomSource {
    /// The seed of the generator (drawn from entropy when none is provided).
    seed: u64,
    #[derivative(Debug = "ignore")]
    rng: ChaCha8Rng,
    /// The last Poisson distribution used, keyed by its rate.
    #[derivative(Debug = "ignore")]
    poisson: Option<(f64, Poisson<f64>)>,
}

impl RandomSource {
    /// Create a new random source.
    /// Without a seed, one is drawn from the thread-local generator so the run can still be replayed.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        RandomSource {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            poisson: None,
        }
    }

    /// Returns the seed of the random source.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns an independent random source sharing the seed but drawing from another stream.
    pub fn fork(&self, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(stream);
        RandomSource {
            seed: self.seed,
            rng,
            poisson: None,
        }
    }

    /// Sample an index uniformly in the half-open range.
    /// Panics if the range is empty.
    pub fn uniform_index(&mut self, range: Range<usize>) -> usize {
        self.rng.gen_range(range)
    }

    /// Sample the number of events of a Poisson process with the given mean.
    /// A zero rate always yields zero.
    pub fn poisson(&mut self, rate: f64) -> Result<f64, SNNError> {
        if rate == 0.0 {
            return Ok(0.0);
        }

        let dist = match self.poisson.take() {
            Some((cached_rate, dist)) if cached_rate == rate => dist,
            _ => Poisson::new(rate).map_err(|e| {
                SNNError::InvalidParameters(format!("Invalid Poisson rate {}: {}", rate, e))
            })?,
        };
        let sample = dist.sample(&mut self.rng);
        self.poisson = Some((rate, dist));

        Ok(sample)
    }
}

impl RngCore for RandomSource {
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
