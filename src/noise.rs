//! Seeded noise samplers for stochastic cost models.
//!
//! A noise model turns the nominal duration of a piece of work into an
//! extra delay. Every sampler owns a `ChaCha8Rng` seeded at construction:
//! two instances built with the same seed produce the same sequence, and
//! nothing is shared between instances. A batch sampler that wants
//! independent samples builds a fresh model (with a fresh seed) per run.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};

use crate::error::{SimError, SimResult};

/// Source of extra delay added on top of a modelled duration.
pub trait NoiseModel {
    /// Extra ticks to add to work whose nominal duration is `duration`.
    fn sample(&mut self, duration: u64) -> u64;
}

/// Boxed noise models are noise models too.
impl<N: NoiseModel + ?Sized> NoiseModel for Box<N> {
    fn sample(&mut self, duration: u64) -> u64 {
        (**self).sample(duration)
    }
}

// ── NoNoise ───────────────────────────────────────────────────────────

/// Always zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl NoiseModel for NoNoise {
    fn sample(&mut self, _duration: u64) -> u64 {
        0
    }
}

// ── UniformNoise ──────────────────────────────────────────────────────

/// Uniform jitter in `[0, max]` ticks, independent of the duration.
#[derive(Debug, Clone)]
pub struct UniformNoise {
    max: u64,
    rng: ChaCha8Rng,
}

impl UniformNoise {
    pub fn new(max: u64, seed: u64) -> Self {
        UniformNoise {
            max,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl NoiseModel for UniformNoise {
    fn sample(&mut self, _duration: u64) -> u64 {
        if self.max == 0 {
            return 0;
        }
        self.rng.gen_range(0..=self.max)
    }
}

// ── GammaNoise ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum GammaScale {
    /// Samples are in ticks.
    Absolute,
    /// Samples are multiplied by the nominal duration.
    Relative,
}

/// Gamma-distributed delay, the heavy-ish tail typical of OS noise.
#[derive(Debug, Clone)]
pub struct GammaNoise {
    gamma: Gamma<f64>,
    scale: GammaScale,
    rng: ChaCha8Rng,
}

impl GammaNoise {
    /// Noise in ticks drawn from `Gamma(shape, scale)`.
    pub fn absolute(shape: f64, scale: f64, seed: u64) -> SimResult<Self> {
        Self::build(shape, scale, GammaScale::Absolute, seed)
    }

    /// Noise as a fraction of the nominal duration: each sample is
    /// `duration * Gamma(shape, fraction)`.
    pub fn relative(shape: f64, fraction: f64, seed: u64) -> SimResult<Self> {
        Self::build(shape, fraction, GammaScale::Relative, seed)
    }

    fn build(shape: f64, scale: f64, mode: GammaScale, seed: u64) -> SimResult<Self> {
        if !(shape > 0.0 && shape.is_finite()) || !(scale > 0.0 && scale.is_finite()) {
            return Err(SimError::InvalidModel(format!(
                "gamma noise needs positive finite shape and scale, got {} and {}",
                shape, scale
            )));
        }
        let gamma =
            Gamma::new(shape, scale).map_err(|e| SimError::InvalidModel(e.to_string()))?;
        Ok(GammaNoise {
            gamma,
            scale: mode,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl NoiseModel for GammaNoise {
    fn sample(&mut self, duration: u64) -> u64 {
        let draw = self.gamma.sample(&mut self.rng);
        let ticks = match self.scale {
            GammaScale::Absolute => draw,
            GammaScale::Relative => draw * duration as f64,
        };
        // `as` saturates for out-of-range floats.
        ticks.round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_noise() {
        assert_eq!(NoNoise.sample(1_000), 0);
    }

    #[test]
    fn test_uniform_bounds_and_determinism() {
        let mut a = UniformNoise::new(50, 7);
        let mut b = UniformNoise::new(50, 7);
        let xs: Vec<u64> = (0..200).map(|_| a.sample(0)).collect();
        let ys: Vec<u64> = (0..200).map(|_| b.sample(0)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&x| x <= 50));
    }

    #[test]
    fn test_uniform_zero_max() {
        let mut n = UniformNoise::new(0, 1);
        assert_eq!(n.sample(100), 0);
    }

    #[test]
    fn test_gamma_rejects_bad_parameters() {
        assert!(GammaNoise::absolute(0.0, 1.0, 1).is_err());
        assert!(GammaNoise::absolute(1.0, -2.0, 1).is_err());
        assert!(GammaNoise::relative(f64::NAN, 0.1, 1).is_err());
    }

    #[test]
    fn test_gamma_same_seed_same_samples() {
        let mut a = GammaNoise::absolute(2.0, 10.0, 42).unwrap();
        let mut b = GammaNoise::absolute(2.0, 10.0, 42).unwrap();
        for _ in 0..100 {
            assert_eq!(a.sample(0), b.sample(0));
        }
    }

    #[test]
    fn test_relative_gamma_scales_with_duration() {
        let mut n = GammaNoise::relative(2.0, 0.05, 3).unwrap();
        assert_eq!(n.sample(0), 0);
    }
}
