use approx::relative_eq;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use crate::{
    config::MarginConfig,
    params::{ParameterAssignment, ParameterSpace},
    JosimToolsError, JosimToolsResult,
};
use super::{first_error, AnalysisError, Evaluator, PartialResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Lower,
    Upper,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Lower, Direction::Upper];

    pub fn suffix(self) -> char {
        match self {
            Self::Lower => '-',
            Self::Upper => '+',
        }
    }

    /// Furthest relative deviation searched in this direction
    pub fn bound(self, settings: &MarginSettings) -> f64 {
        match self {
            Self::Lower => settings.min_search - 1.0,
            Self::Upper => settings.max_search - 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginSettings {
    pub max_search: f64,
    pub min_search: f64,
    pub scan_steps: usize,
    pub binary_search_steps: usize,
}

impl Default for MarginSettings {
    fn default() -> Self {
        Self::from(&MarginConfig::default())
    }
}

impl From<&MarginConfig> for MarginSettings {
    fn from(config: &MarginConfig) -> Self {
        Self {
            max_search: config.max_search,
            min_search: config.min_search,
            scan_steps: config.scan_steps,
            binary_search_steps: config.binary_search_steps,
        }
    }
}

/// What a [`MarginSearch`] wants next
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchStep {
    /// Verify the center with this relative deviation applied
    Probe(f64),
    Done { margin: f64, capped: bool },
}

/// Search for the largest passing deviation in one direction.
///
/// A coarse scan walks from the center to `bound` in `scan_steps` equal
/// steps. The first failing step starts a bisection between it and the
/// last passing step. The reported margin is always a deviation that was
/// verified to pass, or 0 when none did.
#[derive(Debug, Clone, PartialEq)]
pub enum MarginSearch {
    Scan {
        bound: f64,
        steps: usize,
        /// 1-based index of the step being probed
        step: usize,
        last_pass: f64,
        refine_steps: usize,
    },
    Refine {
        pass: f64,
        fail: f64,
        remaining: usize,
    },
    Done {
        margin: f64,
        capped: bool,
    },
}

impl MarginSearch {
    pub fn new(bound: f64, scan_steps: usize, binary_search_steps: usize) -> Self {
        if scan_steps == 0 {
            return Self::Done { margin: 0.0, capped: false };
        }
        Self::Scan { bound, steps: scan_steps, step: 1, last_pass: 0.0, refine_steps: binary_search_steps }
    }

    pub fn step(&self) -> SearchStep {
        match *self {
            Self::Scan { bound, steps, step, .. } => SearchStep::Probe(step as f64 * bound / steps as f64),
            Self::Refine { pass, fail, .. } => SearchStep::Probe((pass + fail) / 2.0),
            Self::Done { margin, capped } => SearchStep::Done { margin, capped },
        }
    }

    /// Move on with the verdict for the deviation of the last [`step`](Self::step)
    pub fn advance(self, passed: bool) -> Self {
        let probe = match self.step() {
            SearchStep::Probe(probe) => probe,
            SearchStep::Done { .. } => return self,
        };

        match self {
            Self::Scan { bound, steps, step, last_pass, refine_steps } => {
                if passed && step == steps {
                    Self::Done { margin: bound, capped: true }
                } else if passed {
                    Self::Scan { bound, steps, step: step + 1, last_pass: probe, refine_steps }
                } else if refine_steps == 0 {
                    Self::Done { margin: last_pass, capped: false }
                } else {
                    Self::Refine { pass: last_pass, fail: probe, remaining: refine_steps }
                }
            }
            Self::Refine { pass, fail, remaining } => {
                let (pass, fail) = if passed { (probe, fail) } else { (pass, probe) };
                if remaining <= 1 {
                    Self::Done { margin: pass, capped: false }
                } else {
                    Self::Refine { pass, fail, remaining: remaining - 1 }
                }
            }
            done @ Self::Done { .. } => done,
        }
    }
}

/// Finished search of one (parameter, direction) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionMargin {
    pub parameter: String,
    pub direction: Direction,
    /// Signed relative deviation, `<= 0` for [`Direction::Lower`]
    pub margin: f64,
    /// The whole search range passed
    pub capped: bool,
}

impl DirectionMargin {
    pub fn label(&self) -> String {
        format!("{}{}", self.parameter, self.direction.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterMargin {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub lower_capped: bool,
    pub upper_capped: bool,
}

/// Smallest absolute margin and every pair that ties for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalMargin {
    pub margin: f64,
    pub labels: Vec<String>,
}

impl CriticalMargin {
    pub fn from_margins<'a>(margins: impl IntoIterator<Item = &'a DirectionMargin>) -> Option<Self> {
        let mut critical: Option<Self> = None;
        for margin in margins {
            let value = margin.margin.abs();
            match critical.as_mut() {
                Some(c) if relative_eq!(c.margin, value, max_relative = 1e-9) => c.labels.push(margin.label()),
                Some(c) if value < c.margin => *c = Self { margin: value, labels: vec![margin.label()] },
                Some(_) => {}
                None => critical = Some(Self { margin: value, labels: vec![margin.label()] }),
            }
        }
        critical
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginResult {
    pub margins: Vec<ParameterMargin>,
    pub critical: CriticalMargin,
    pub settings: MarginSettings,
}

impl MarginResult {
    /// Pair up the directions per parameter, keeping the order of `names`
    pub fn new(names: &[String], directions: &[DirectionMargin], settings: MarginSettings) -> JosimToolsResult<Self> {
        let find = |name: &str, direction: Direction| {
            directions
                .iter()
                .find(|d| d.parameter == name && d.direction == direction)
                .ok_or_else(|| JosimToolsError::Message(format!("no {:?} margin for '{}'", direction, name)))
        };

        let mut ordered = Vec::with_capacity(names.len() * 2);
        let mut margins = Vec::with_capacity(names.len());
        for name in names {
            let lower = find(name, Direction::Lower)?;
            let upper = find(name, Direction::Upper)?;
            margins.push(ParameterMargin {
                name: name.clone(),
                lower: lower.margin,
                upper: upper.margin,
                lower_capped: lower.capped,
                upper_capped: upper.capped,
            });
            ordered.push(lower);
            ordered.push(upper);
        }

        let critical = CriticalMargin::from_margins(ordered)
            .ok_or_else(|| JosimToolsError::Message("no parameter to analyze".into()))?;

        Ok(Self { margins, critical, settings })
    }

    pub fn critical_margin(&self) -> f64 {
        self.critical.margin
    }

    pub fn get(&self, name: &str) -> Option<&ParameterMargin> {
        self.margins.iter().find(|m| m.name == name)
    }
}

/// Margins of a set of parameters around a center assignment
pub struct MarginAnalysis<'a> {
    evaluator: &'a Evaluator,
    space: &'a ParameterSpace,
    settings: MarginSettings,
}

impl<'a> MarginAnalysis<'a> {
    pub fn new(evaluator: &'a Evaluator, space: &'a ParameterSpace, settings: MarginSettings) -> Self {
        Self { evaluator, space, settings }
    }

    pub fn settings(&self) -> &MarginSettings {
        &self.settings
    }

    /// Verify `center` and search every `names` in both directions
    pub fn run(&self, center: &ParameterAssignment, names: &[String]) -> JosimToolsResult<MarginResult> {
        self.space.validate_references(names.iter().map(|s| s.as_str()))?;

        info!("verify center point");
        if !self.evaluator.check(center)? {
            return Err(AnalysisError::NominalFailed.into());
        }

        self.analyze(center, names)
    }

    /// Search without verifying `center`, which the caller already did
    pub fn analyze(&self, center: &ParameterAssignment, names: &[String]) -> JosimToolsResult<MarginResult> {
        self.space.validate_references(names.iter().map(|s| s.as_str()))?;
        if names.is_empty() {
            return Err(JosimToolsError::Message("no parameter to analyze".into()));
        }

        info!("margin analysis of {} parameters", names.len());
        let pairs: Vec<(&String, Direction)> = names
            .iter()
            .flat_map(|name| Direction::BOTH.into_iter().map(move |direction| (name, direction)))
            .collect();

        let results: Vec<JosimToolsResult<DirectionMargin>> = pairs
            .into_par_iter()
            .map(|(name, direction)| self.search(center, name, direction))
            .collect();

        let mut finished = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(margin) => finished.push(margin),
                Err(e) => errors.push(e),
            }
        }

        if let Some(err) = first_error(errors) {
            return Err(AnalysisError::aborted(PartialResult::Margin(finished), err).into());
        }

        MarginResult::new(names, &finished, self.settings)
    }

    fn search(&self, center: &ParameterAssignment, name: &str, direction: Direction) -> JosimToolsResult<DirectionMargin> {
        let bound = direction.bound(&self.settings);
        let mut search = MarginSearch::new(bound, self.settings.scan_steps, self.settings.binary_search_steps);

        loop {
            match search.step() {
                SearchStep::Probe(delta) => {
                    let passed = self.evaluator.check(&center.perturbed(name, delta)?)?;
                    debug!("{}{} at {:+.4}: {}", name, direction.suffix(), delta, if passed { "pass" } else { "fail" });
                    search = search.advance(passed);
                }
                SearchStep::Done { margin, capped } => {
                    debug!("{}{} margin {:+.4}", name, direction.suffix(), margin);
                    return Ok(DirectionMargin { parameter: name.to_string(), direction, margin, capped });
                }
            }
        }
    }
}
