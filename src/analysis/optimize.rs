use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use crate::{
    config::OptimizeConfig,
    params::{ParameterAssignment, ParameterSpace},
    JosimToolsError, JosimToolsResult,
};
use super::{AnalysisError, Evaluator, MarginAnalysis, MarginResult, MarginSettings, PartialResult};

/// Guesses the critical margin of a point without simulating it
pub trait ScoreEstimator: Send {
    fn estimate(&self, candidate: &ParameterAssignment) -> f64;

    /// A point passed verification and was margin analyzed
    fn observe(&mut self, _candidate: &ParameterAssignment, _margins: &MarginResult) {}

    /// A point failed verification
    fn observe_failure(&mut self, _candidate: &ParameterAssignment) {}
}

/// Scores a point by its distance to the nearest known failure, in
/// coordinates relative to the point itself.
///
/// Every margin edge found by an analysis is kept as a failure point, so
/// after observing a point its estimate equals its critical margin.
#[derive(Debug, Clone)]
pub struct FailureDistanceEstimator {
    names: Vec<String>,
    failures: Vec<ParameterAssignment>,
    cap: f64,
}

impl FailureDistanceEstimator {
    pub fn new(names: Vec<String>, cap: f64) -> Self {
        Self { names, failures: vec![], cap }
    }

    /// Capped at the narrower search bound, no margin can be larger
    pub fn from_settings(names: Vec<String>, settings: &MarginSettings) -> Self {
        let cap = (settings.max_search - 1.0).abs().min((settings.min_search - 1.0).abs());
        Self::new(names, cap)
    }

    pub fn failures(&self) -> &[ParameterAssignment] {
        &self.failures
    }

    fn distance(&self, candidate: &ParameterAssignment, failure: &ParameterAssignment) -> f64 {
        self.names
            .iter()
            .filter_map(|name| match (candidate.get(name), failure.get(name)) {
                (Some(x), Some(f)) if x != 0.0 => Some((f / x - 1.0).powi(2)),
                _ => None,
            })
            .sum::<f64>()
            .sqrt()
    }
}

impl ScoreEstimator for FailureDistanceEstimator {
    fn estimate(&self, candidate: &ParameterAssignment) -> f64 {
        self.failures
            .iter()
            .map(|failure| self.distance(candidate, failure))
            .fold(self.cap, f64::min)
    }

    fn observe(&mut self, candidate: &ParameterAssignment, margins: &MarginResult) {
        for margin in margins.margins.iter() {
            let edges = [(margin.lower, margin.lower_capped), (margin.upper, margin.upper_capped)];
            for (delta, capped) in edges {
                if capped {
                    continue;
                }
                if let Ok(point) = candidate.perturbed(&margin.name, delta) {
                    self.failures.push(point);
                }
            }
        }
    }

    fn observe_failure(&mut self, candidate: &ParameterAssignment) {
        self.failures.push(candidate.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeSettings {
    pub search_radius: f64,
    pub converge: f64,
    pub max_iterations: usize,
    pub candidates: usize,
    pub seed: Option<u64>,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self::from(&OptimizeConfig::default())
    }
}

impl From<&OptimizeConfig> for OptimizeSettings {
    fn from(config: &OptimizeConfig) -> Self {
        Self {
            search_radius: config.search_radius,
            converge: config.converge,
            max_iterations: config.max_iterations,
            candidates: config.candidates,
            seed: config.seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptimizationStatus {
    Running,
    Converged,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationState {
    pub best: ParameterAssignment,
    /// Critical margin of `best`
    pub best_score: f64,
    pub best_margins: MarginResult,
    /// Critical margin of the starting point
    pub nominal_score: f64,
    pub iteration: usize,
    pub status: OptimizationStatus,
}

/// Local search maximizing the critical margin.
///
/// Each iteration scores random points around the current best with the
/// estimator, verifies the most promising one and margin analyzes it when
/// it passes. A point only replaces the best when its analyzed critical
/// margin is strictly larger, so the result is never worse than the start.
pub struct OptimizationEngine<'a> {
    evaluator: &'a Evaluator,
    space: &'a ParameterSpace,
    margin: MarginAnalysis<'a>,
    settings: OptimizeSettings,
    names: Vec<String>,
    estimator: Box<dyn ScoreEstimator + 'a>,
}

impl<'a> OptimizationEngine<'a> {
    pub fn new(
        evaluator: &'a Evaluator,
        space: &'a ParameterSpace,
        margin_settings: MarginSettings,
        settings: OptimizeSettings,
        names: Vec<String>,
    ) -> Self {
        let estimator = FailureDistanceEstimator::from_settings(names.clone(), &margin_settings);
        Self {
            evaluator,
            space,
            margin: MarginAnalysis::new(evaluator, space, margin_settings),
            settings,
            names,
            estimator: Box::new(estimator),
        }
    }

    pub fn with_estimator(mut self, estimator: Box<dyn ScoreEstimator + 'a>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn run(&mut self, center: &ParameterAssignment) -> JosimToolsResult<OptimizationState> {
        self.space.validate_references(self.names.iter().map(|s| s.as_str()))?;

        info!("analyze starting point");
        let margins = self.margin.run(center, &self.names)?;
        self.estimator.observe(center, &margins);

        let score = margins.critical_margin();
        info!("starting critical margin {:.1} %", score * 100.0);
        let mut state = OptimizationState {
            best: center.clone(),
            best_score: score,
            best_margins: margins,
            nominal_score: score,
            iteration: 0,
            status: OptimizationStatus::Running,
        };

        let seed = self.settings.seed.unwrap_or_else(|| rand::rng().random());
        info!("optimize {} parameters, seed {}", self.names.len(), seed);
        let mut rng = StdRng::seed_from_u64(seed);

        while state.iteration < self.settings.max_iterations {
            state.iteration += 1;

            let (candidate, estimate) = self.next_guess(&state.best, &mut rng)?;
            info!("iteration {}: guess estimated at {:.1} %", state.iteration, estimate * 100.0);

            let passed = self.evaluator.check(&candidate).map_err(|e| Self::abort(&state, e))?;
            if !passed {
                debug!("guess failed verification");
                self.estimator.observe_failure(&candidate);
                continue;
            }

            let margins = self.margin.analyze(&candidate, &self.names).map_err(|e| Self::abort(&state, e))?;
            self.estimator.observe(&candidate, &margins);
            let actual = margins.critical_margin();

            let error = (estimate - actual).abs() / actual.abs().max(f64::EPSILON);
            info!("guess critical margin {:.1} %, estimation error {:.3}", actual * 100.0, error);

            if actual > state.best_score {
                info!("new best critical margin {:.1} %", actual * 100.0);
                state.best = candidate;
                state.best_score = actual;
                state.best_margins = margins;
            }

            if error < self.settings.converge {
                state.status = OptimizationStatus::Converged;
                break;
            }
        }

        if state.status == OptimizationStatus::Running {
            info!("reached maximum number of iterations");
            state.status = OptimizationStatus::MaxIterations;
        }

        Ok(state)
    }

    /// The candidate the estimator likes most, with its estimate
    fn next_guess(&self, best: &ParameterAssignment, rng: &mut StdRng) -> JosimToolsResult<(ParameterAssignment, f64)> {
        let mut guess: Option<(ParameterAssignment, f64)> = None;
        for _ in 0..self.settings.candidates.max(1) {
            let candidate = self.space.sample_around(best, &self.names, self.settings.search_radius, rng)?;
            let estimate = self.estimator.estimate(&candidate);
            if guess.as_ref().is_none_or(|(_, e)| estimate > *e) {
                guess = Some((candidate, estimate));
            }
        }
        guess.ok_or_else(|| JosimToolsError::Message("no candidate drawn".into()))
    }

    /// Wrap a failure mid search, keeping the best point found so far
    fn abort(state: &OptimizationState, err: JosimToolsError) -> JosimToolsError {
        let cause = match err {
            JosimToolsError::Analysis(AnalysisError::Aborted { source, .. }) => *source,
            other => other,
        };
        AnalysisError::aborted(PartialResult::Optimize(state.clone()), cause).into()
    }
}
