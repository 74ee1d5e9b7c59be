use std::fmt::{self, Display};
use std::sync::Arc;
use serde::Serialize;
use tracing::info;
use crate::{
    analysis::{
        AnalysisError, CancelToken, Evaluator, MarginAnalysis, MarginResult, MarginSettings, OptimizationEngine, OptimizationState,
        OptimizeSettings, Outcome, PartialResult, YieldAnalysis, YieldResult, YieldSettings,
    },
    config::{Config, ConfigError, Mode},
    params::{ParameterAssignment, ParameterSpace},
    simulate::{CommandTemplate, ExecuteCommand, JoSim, JosimAdapter, JosimAdapterBuilder, SimulationAdapter},
    verify::{SpecFile, SpecVerifier},
    ErrorContext, JosimToolsResult,
};

/// Single verification of the nominal point
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub assignment: ParameterAssignment,
    pub outcome: Outcome,
}

impl Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Verified(result) => {
                for junction in result.junctions.iter() {
                    match junction.failed_at {
                        None => writeln!(f, "{}: pass, max deviation {:.3}", junction.name, junction.max_deviation)?,
                        Some(time) => writeln!(f, "{}: fail at {:e}, max deviation {:.3}", junction.name, time, junction.max_deviation)?,
                    }
                }
            }
            Outcome::SimulationFailed(reason) => writeln!(f, "simulation failed: {}", reason)?,
        }
        writeln!(f, "Verification: {}", if self.outcome.passed() { "PASS" } else { "FAIL" })
    }
}

#[derive(Debug, Clone)]
pub enum Report {
    Verify(VerifyReport),
    Margin(MarginResult),
    Yield(YieldResult),
    Optimize(OptimizationState),
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verify(report) => Display::fmt(report, f),
            Self::Margin(result) => Display::fmt(result, f),
            Self::Yield(result) => Display::fmt(result, f),
            Self::Optimize(state) => Display::fmt(state, f),
        }
    }
}

/// Everything a run needs besides the simulator, checked before any
/// simulation starts
pub struct Session {
    config: Config,
    space: ParameterSpace,
    verifier: Arc<SpecVerifier>,
}

impl Session {
    pub fn new(config: Config) -> JosimToolsResult<Self> {
        config.validate()?;
        let space = config.parameter_space()?;
        let spec = SpecFile::load(&config.verify.file)?;
        let verifier = Arc::new(SpecVerifier::new(spec, config.verify.threshold));
        info!("loaded {} parameters, {} junctions to verify", space.len(), verifier.spec().names().len());
        Ok(Self { config, space, verifier })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn verifier(&self) -> &SpecVerifier {
        &self.verifier
    }

    /// JoSIM adapter set up from the [simulator] table
    pub fn josim_adapter(&self) -> JosimToolsResult<JosimAdapter> {
        let simulator = &self.config.simulator;
        let command: Box<dyn ExecuteCommand> = match &simulator.command {
            Some(template) => Box::new(CommandTemplate::new(template.clone())),
            None if self.config.verify.wrspice_compatibility => Box::new(JoSim::wrspice()),
            None => Box::new(JoSim::default()),
        };

        let mut builder = JosimAdapterBuilder::default()
            .probes(self.verifier.probes())
            .command(command);
        if let Some(timeout) = simulator.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(temp_folder) = &simulator.temp_folder {
            builder = builder.temp_folder(temp_folder.clone());
        }
        builder.build().context("build simulator adapter")
    }

    pub fn run(&self, adapter: Arc<dyn SimulationAdapter>, cancel: CancelToken) -> JosimToolsResult<Report> {
        let evaluator = Evaluator::new(adapter, self.verifier.clone(), &self.config.verify.circuit, cancel);
        let center = self.space.nominal_assignment();
        let margin_settings = MarginSettings::from(&self.config.margin);

        info!("run {} on '{}'", self.config.mode, self.config.verify.circuit.display());
        match self.config.mode {
            Mode::Verify => {
                let outcome = evaluator.evaluate(&center)?;
                Ok(Report::Verify(VerifyReport { assignment: center, outcome }))
            }
            Mode::Margin => {
                let result = MarginAnalysis::new(&evaluator, &self.space, margin_settings)
                    .run(&center, &self.config.margin_parameters())?;
                Ok(Report::Margin(result))
            }
            Mode::Yield => {
                let config = self.config.yield_analysis.as_ref().ok_or(ConfigError::MissingTable("yield", "yield"))?;
                let result = YieldAnalysis::new(&evaluator, &self.space).run(&YieldSettings::from(config))?;
                Ok(Report::Yield(result))
            }
            Mode::Optimize => {
                let config = self.config.optimize.as_ref().ok_or(ConfigError::MissingTable("optimize", "optimize"))?;
                let state = OptimizationEngine::new(
                    &evaluator,
                    &self.space,
                    margin_settings,
                    OptimizeSettings::from(config),
                    self.config.optimize_parameters(),
                )
                .run(&center)?;

                if let Some(output) = &config.output {
                    if let Err(e) = write_json(output, &state.best) {
                        return Err(AnalysisError::aborted(PartialResult::Optimize(state), e).into());
                    }
                    info!("optimized parameters written to '{}'", output.display());
                }
                Ok(Report::Optimize(state))
            }
        }
    }
}

fn write_json<T: Serialize>(path: &std::path::Path, value: &T) -> JosimToolsResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create '{}'", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("write '{}'", path.display()))
}
