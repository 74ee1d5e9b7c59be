mod error;
mod distribution;
pub use error::*;
pub use distribution::*;

use derive_new::new;
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A named circuit parameter, immutable once an analysis starts
#[derive(Debug, Clone, PartialEq, new)]
pub struct Parameter {
    pub name: String,
    pub nominal: f64,
    #[new(default)]
    pub min: Option<f64>,
    #[new(default)]
    pub max: Option<f64>,
    #[new(default)]
    pub distribution: Distribution,
}

impl Parameter {
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Clamp `value` into `[min, max]`, a missing bound is open
    pub fn clamp(&self, value: f64) -> f64 {
        let value = match self.min {
            Some(min) => value.max(min),
            None => value,
        };
        match self.max {
            Some(max) => value.min(max),
            None => value,
        }
    }
}

/// Concrete values for one simulation run, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterAssignment(IndexMap<String, f64>);

impl ParameterAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, &value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with `name` scaled by `1 + delta`, every other value untouched
    pub fn perturbed(&self, name: &str, delta: f64) -> Result<Self, ParameterError> {
        let mut assignment = self.clone();
        match assignment.0.get_mut(name) {
            Some(value) => *value *= 1.0 + delta,
            None => return Err(ParameterError::UnknownParameter(name.to_string())),
        }
        Ok(assignment)
    }
}

impl FromIterator<(String, f64)> for ParameterAssignment {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ParameterAssignment {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(name, value)| (name.to_string(), value)).collect())
    }
}

/// Owns every parameter definition of a run
#[derive(Debug, Clone, Default)]
pub struct ParameterSpace {
    parameters: IndexMap<String, Parameter>,
}

impl ParameterSpace {
    pub fn new(parameters: impl IntoIterator<Item = Parameter>) -> Result<Self, ParameterError> {
        let mut space = IndexMap::new();
        for parameter in parameters {
            if !parameter.nominal.is_finite() {
                return Err(ParameterError::InvalidNominal { name: parameter.name, value: parameter.nominal });
            }
            if let (Some(min), Some(max)) = (parameter.min, parameter.max) {
                if min > max {
                    return Err(ParameterError::InvalidBounds { name: parameter.name, min, max });
                }
            }
            parameter.distribution.validate(&parameter.name)?;

            if space.contains_key(&parameter.name) {
                return Err(ParameterError::DuplicateParameter(parameter.name));
            }
            space.insert(parameter.name.clone(), parameter);
        }

        Ok(Self { parameters: space })
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, ParameterError> {
        self.get(name).ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Every name must be defined, the first one that is not is reported
    pub fn validate_references<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), ParameterError> {
        for name in names {
            if !self.parameters.contains_key(name) {
                return Err(ParameterError::UnknownParameter(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn nominal_assignment(&self) -> ParameterAssignment {
        self.parameters.values().map(|p| (p.name.as_str(), p.nominal)).collect()
    }

    pub fn perturbed(&self, name: &str, delta: f64) -> Result<ParameterAssignment, ParameterError> {
        self.nominal_assignment().perturbed(name, delta)
    }

    /// `steps` evenly spaced deviations of `name` around `center`, walking
    /// from `from` (excluded) to `to` (included)
    pub fn grid(
        &self,
        name: &str,
        center: &ParameterAssignment,
        from: f64,
        to: f64,
        steps: usize,
    ) -> Result<Vec<(f64, ParameterAssignment)>, ParameterError> {
        self.parameter(name)?;
        if steps == 0 {
            return Ok(vec![]);
        }

        let step = (to - from) / steps as f64;
        (1..=steps)
            .map(|i| {
                let delta = from + i as f64 * step;
                center.perturbed(name, delta).map(|assignment| (delta, assignment))
            })
            .collect()
    }

    /// Draw every parameter from its own distribution
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterAssignment {
        self.parameters
            .values()
            .map(|p| (p.name.as_str(), p.distribution.sample(p.nominal, rng)))
            .collect()
    }

    /// Uniform draw inside the `±radius` box around `center` for `names`,
    /// clamped to each parameter's bounds. Other values are copied.
    pub fn sample_around<R: Rng>(
        &self,
        center: &ParameterAssignment,
        names: &[String],
        radius: f64,
        rng: &mut R,
    ) -> Result<ParameterAssignment, ParameterError> {
        let mut candidate = center.clone();
        for name in names {
            let parameter = self.parameter(name)?;
            let value = center.get(name).ok_or_else(|| ParameterError::UnknownParameter(name.clone()))?;

            let a = parameter.clamp((1.0 - radius) * value);
            let b = parameter.clamp((1.0 + radius) * value);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let sampled = if low == high { low } else { rng.random_range(low..=high) };
            candidate.set(name.clone(), sampled);
        }
        Ok(candidate)
    }
}
