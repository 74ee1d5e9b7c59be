use rand::Rng;
use rand_distr::{Distribution as _, Normal};
use serde::{Deserialize, Serialize};
use super::ParameterError;

/// How a parameter varies between yield samples.
///
/// Every bound is absolute, in the parameter's own unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Distribution {
    /// Held at nominal
    #[default]
    Nominal,
    Normal { sigma: f64 },
    Uniform { low: f64, high: f64 },
}

impl Distribution {
    pub fn validate(&self, name: &str) -> Result<(), ParameterError> {
        let invalid = |reason: String| ParameterError::InvalidDistribution { name: name.to_string(), reason };
        match *self {
            Self::Nominal => Ok(()),
            Self::Normal { sigma } => {
                if sigma.is_finite() && sigma >= 0.0 {
                    Ok(())
                } else {
                    Err(invalid(format!("sigma '{}' must be finite and not negative", sigma)))
                }
            }
            Self::Uniform { low, high } => {
                if low.is_finite() && high.is_finite() && low <= high {
                    Ok(())
                } else {
                    Err(invalid(format!("uniform range [{}, {}] is empty or not finite", low, high)))
                }
            }
        }
    }

    /// Draw a value, `nominal` is the center of a normal distribution
    pub fn sample<R: Rng>(&self, nominal: f64, rng: &mut R) -> f64 {
        match *self {
            Self::Nominal => nominal,
            Self::Normal { sigma } => match Normal::new(nominal, sigma) {
                Ok(normal) => normal.sample(rng),
                Err(_) => nominal,
            },
            Self::Uniform { low, high } => {
                if low == high { low } else { rng.random_range(low..=high) }
            }
        }
    }
}
