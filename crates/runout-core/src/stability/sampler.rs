//! Geotechnical parameter distributions and the per-iteration sampler.
//!
//! Draws map a uniform variate through closed-form inverse transforms, so a
//! sampler seeded for a given iteration always reproduces the same values.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{MassWastingError, Result};

/// Mixes the iteration number into the run seed.
const ITERATION_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// A declared statistical distribution for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, std_dev: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
    Uniform { min: f64, max: f64 },
}

impl Distribution {
    /// Value used for deterministic (non-sampled) evaluations.
    pub fn central_value(&self) -> f64 {
        match *self {
            Distribution::Normal { mean, .. } => mean,
            Distribution::Triangular { mode, .. } => mode,
            Distribution::Uniform { min, max } => 0.5 * (min + max),
        }
    }

    /// Map a uniform variate `u ∈ [0, 1)` onto the distribution.
    ///
    /// The normal branch uses the Tukey-lambda style approximation
    /// `4.91·σ·(u^0.14 − (1−u)^0.14) + μ`.
    pub fn quantile(&self, u: f64) -> f64 {
        match *self {
            Distribution::Normal { mean, std_dev } => 4.91 * std_dev * (u.powf(0.14) - (1.0 - u).powf(0.14)) + mean,
            Distribution::Triangular { min, mode, max } => {
                let span = max - min;
                if span <= 0.0 {
                    return min;
                }
                if u >= (mode - min) / span {
                    max - ((1.0 - u) * span * (max - mode)).sqrt()
                } else {
                    min + (u * (mode - min) * span).sqrt()
                }
            }
            Distribution::Uniform { min, max } => min + (max - min) * u,
        }
    }

    pub fn validate(&self, what: &str) -> Result<()> {
        let ok = match *self {
            Distribution::Normal { mean, std_dev } => mean.is_finite() && std_dev.is_finite() && std_dev >= 0.0,
            Distribution::Triangular { min, mode, max } => min <= mode && mode <= max && max.is_finite() && min.is_finite(),
            Distribution::Uniform { min, max } => min <= max && min.is_finite() && max.is_finite(),
        };
        if ok {
            Ok(())
        } else {
            Err(MassWastingError::InvalidConfig(format!("{what}: malformed distribution {self:?}")))
        }
    }
}

/// Source of parameter values for one Monte-Carlo iteration.
///
/// Iteration 0 is always deterministic; later iterations own a private RNG
/// seeded from `(seed, iteration)` so they can run on any thread.
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    rng: Option<StdRng>,
}

impl ParameterSampler {
    /// A sampler that always returns each distribution's central value.
    pub fn deterministic() -> Self {
        Self { rng: None }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: Some(StdRng::seed_from_u64(seed)) }
    }

    pub fn for_iteration(seed: u64, iteration: usize) -> Self {
        if iteration == 0 {
            Self::deterministic()
        } else {
            Self::seeded(seed ^ (iteration as u64).wrapping_mul(ITERATION_SEED_MIX))
        }
    }

    #[inline]
    pub fn is_stochastic(&self) -> bool {
        self.rng.is_some()
    }

    pub fn draw(&mut self, dist: &Distribution) -> f64 {
        match self.rng.as_mut() {
            Some(rng) => dist.quantile(rng.gen::<f64>()),
            None => dist.central_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_values() {
        assert_eq!(Distribution::Normal { mean: 3.0, std_dev: 1.0 }.central_value(), 3.0);
        assert_eq!(Distribution::Triangular { min: 1.0, mode: 2.0, max: 5.0 }.central_value(), 2.0);
        assert_eq!(Distribution::Uniform { min: 2.0, max: 4.0 }.central_value(), 3.0);
    }

    #[test]
    fn normal_quantile_is_centred_and_monotone() {
        let d = Distribution::Normal { mean: 10.0, std_dev: 2.0 };
        assert!((d.quantile(0.5) - 10.0).abs() < 1e-12);
        assert!(d.quantile(0.1) < d.quantile(0.5));
        assert!(d.quantile(0.9) > d.quantile(0.5));
        // Symmetric about the mean.
        assert!((d.quantile(0.2) - 10.0 + d.quantile(0.8) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn triangular_quantile_hits_the_bounds_and_the_mode() {
        let d = Distribution::Triangular { min: 0.0, mode: 2.0, max: 10.0 };
        assert!((d.quantile(0.0) - 0.0).abs() < 1e-12);
        assert!((d.quantile(1.0) - 10.0).abs() < 1e-12);
        // CDF at the mode is (mode - min) / (max - min) = 0.2.
        assert!((d.quantile(0.2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_triangle_returns_min() {
        let d = Distribution::Triangular { min: 3.0, mode: 3.0, max: 3.0 };
        assert_eq!(d.quantile(0.7), 3.0);
    }

    #[test]
    fn samples_stay_in_range() {
        let mut s = ParameterSampler::seeded(9);
        let u = Distribution::Uniform { min: -1.0, max: 1.0 };
        let t = Distribution::Triangular { min: 5.0, mode: 6.0, max: 9.0 };
        for _ in 0..1_000 {
            let a = s.draw(&u);
            let b = s.draw(&t);
            assert!((-1.0..1.0).contains(&a), "uniform draw {a}");
            assert!((5.0..=9.0).contains(&b), "triangular draw {b}");
        }
    }

    #[test]
    fn iteration_zero_is_deterministic_and_later_iterations_reproduce() {
        let d = Distribution::Uniform { min: 0.0, max: 100.0 };
        assert!(!ParameterSampler::for_iteration(7, 0).is_stochastic());
        assert_eq!(ParameterSampler::for_iteration(7, 0).draw(&d), 50.0);

        let a: Vec<f64> = {
            let mut s = ParameterSampler::for_iteration(7, 3);
            (0..5).map(|_| s.draw(&d)).collect()
        };
        let b: Vec<f64> = {
            let mut s = ParameterSampler::for_iteration(7, 3);
            (0..5).map(|_| s.draw(&d)).collect()
        };
        let c: Vec<f64> = {
            let mut s = ParameterSampler::for_iteration(7, 4);
            (0..5).map(|_| s.draw(&d)).collect()
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn malformed_distributions_are_rejected() {
        assert!(Distribution::Uniform { min: 2.0, max: 1.0 }.validate("x").is_err());
        assert!(Distribution::Normal { mean: 0.0, std_dev: -1.0 }.validate("x").is_err());
        assert!(Distribution::Triangular { min: 0.0, mode: 4.0, max: 3.0 }.validate("x").is_err());
        Distribution::Triangular { min: 0.0, mode: 1.0, max: 3.0 }.validate("x").unwrap();
    }
}
