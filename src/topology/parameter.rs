//! Distance dependent parameters.
//!
//! Used for connection probabilities (kernels), weights and delays of topological connections.
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistanceParameter {
    /// The same value at any distance.
    Constant { value: f64 },
    /// `c + a * d`
    Linear { a: f64, c: f64 },
    /// `c + a * exp(-d / tau)`
    Exponential { a: f64, c: f64, tau: f64 },
    /// `c + p_center * exp(-(d - mean)^2 / (2 * sigma^2))`
    Gaussian {
        p_center: f64,
        mean: f64,
        sigma: f64,
        c: f64,
    },
    /// Independent of distance, drawn uniformly in `[min, max)`.
    Uniform { min: f64, max: f64 },
}

impl From<f64> for DistanceParameter {
    fn from(value: f64) -> Self {
        DistanceParameter::Constant { value }
    }
}

impl DistanceParameter {
    pub fn validate(&self) -> Result<(), KernelError> {
        let ok = match self {
            DistanceParameter::Constant { value } => value.is_finite(),
            DistanceParameter::Linear { a, c } => a.is_finite() && c.is_finite(),
            DistanceParameter::Exponential { a, c, tau } => {
                a.is_finite() && c.is_finite() && tau.is_finite() && *tau > 0.0
            }
            DistanceParameter::Gaussian {
                p_center,
                mean,
                sigma,
                c,
            } => p_center.is_finite() && mean.is_finite() && c.is_finite() && *sigma > 0.0 && sigma.is_finite(),
            DistanceParameter::Uniform { min, max } => {
                min.is_finite() && max.is_finite() && min < max
            }
        };
        if ok {
            Ok(())
        } else {
            Err(KernelError::InvalidParameter(format!(
                "invalid distance parameter {:?}",
                self
            )))
        }
    }

    /// Returns true if evaluating the parameter consumes random numbers.
    pub fn is_random(&self) -> bool {
        matches!(self, DistanceParameter::Uniform { .. })
    }

    /// Evaluate the parameter at the given distance.
    pub fn value<R: Rng + ?Sized>(&self, distance: f64, rng: &mut R) -> f64 {
        match self {
            DistanceParameter::Constant { value } => *value,
            DistanceParameter::Linear { a, c } => c + a * distance,
            DistanceParameter::Exponential { a, c, tau } => c + a * (-distance / tau).exp(),
            DistanceParameter::Gaussian {
                p_center,
                mean,
                sigma,
                c,
            } => c + p_center * (-(distance - mean).powi(2) / (2.0 * sigma * sigma)).exp(),
            DistanceParameter::Uniform { min, max } => Uniform::new(*min, *max).sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_relative_eq!(DistanceParameter::from(2.5).value(10.0, &mut rng), 2.5);
        assert_relative_eq!(
            DistanceParameter::Linear { a: -2.0, c: 1.0 }.value(0.25, &mut rng),
            0.5
        );
        assert_relative_eq!(
            DistanceParameter::Exponential {
                a: 1.0,
                c: 0.5,
                tau: 2.0
            }
            .value(2.0, &mut rng),
            0.5 + (-1.0_f64).exp()
        );
        assert_relative_eq!(
            DistanceParameter::Gaussian {
                p_center: 1.0,
                mean: 0.0,
                sigma: 1.0,
                c: 0.0
            }
            .value(1.0, &mut rng),
            (-0.5_f64).exp()
        );
    }

    #[test]
    fn test_uniform() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let param = DistanceParameter::Uniform { min: 1.0, max: 2.0 };
        assert!(param.is_random());
        for _ in 0..100 {
            let v = param.value(0.0, &mut rng);
            assert!((1.0..2.0).contains(&v));
        }
    }

    #[test]
    fn test_validate() {
        assert!(DistanceParameter::Uniform { min: 1.0, max: 1.0 }.validate().is_err());
        assert!(DistanceParameter::Exponential {
            a: 1.0,
            c: 0.0,
            tau: 0.0
        }
        .validate()
        .is_err());
        assert!(DistanceParameter::from(f64::NAN).validate().is_err());
        assert!(DistanceParameter::Linear { a: 1.0, c: 0.0 }.validate().is_ok());
    }
}
