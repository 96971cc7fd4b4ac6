//! Uniform sample sources for stochastic units.
//!
//! Each unit owns its source; nothing here is process-wide. Any `rand`
//! generator works, and `SampleSequence` replays fixed samples so that
//! stochastic output can be asserted exactly.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// A source of uniform samples in `[0, 1)`.
pub trait UniformSource: Send {
    fn next_uniform(&mut self) -> f64;
}

impl<R: RngCore + Send> UniformSource for R {
    fn next_uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Seeded generator, or an entropy-seeded one when `seed` is `None`.
pub fn seeded_source(seed: Option<u64>) -> Box<dyn UniformSource> {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(StdRng::from_entropy()),
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct SampleSequence {
    samples: Vec<f64>,
    next: usize,
}

impl SampleSequence {
    /// Panics if `samples` is empty.
    pub fn new(samples: Vec<f64>) -> Self {
        assert!(!samples.is_empty(), "SampleSequence needs at least one sample");
        Self { samples, next: 0 }
    }

    pub fn constant(u: f64) -> Self {
        Self::new(vec![u])
    }
}

impl UniformSource for SampleSequence {
    fn next_uniform(&mut self) -> f64 {
        let u = self.samples[self.next];
        self.next = (self.next + 1) % self.samples.len();
        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = seeded_source(Some(7));
        let mut b = seeded_source(Some(7));
        for _ in 0..16 {
            let u = a.next_uniform();
            assert!((0.0..1.0).contains(&u));
            assert_eq!(u, b.next_uniform());
        }
    }

    #[test]
    fn test_sample_sequence_cycles() {
        let mut seq = SampleSequence::new(vec![0.1, 0.9]);
        assert_eq!(seq.next_uniform(), 0.1);
        assert_eq!(seq.next_uniform(), 0.9);
        assert_eq!(seq.next_uniform(), 0.1);
    }
}
