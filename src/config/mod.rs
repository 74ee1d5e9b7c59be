//! Analysis configuration, loaded from a TOML file.
//!
//! ```toml
//! mode = "margin"
//!
//! [verify]
//! method = "spec_file"
//! circuit = "splitter.cir"
//! file = "splitter.spec"
//!
//! [parameters]
//! Btotal = { nominal = 1.0 }
//! Ltotal = { nominal = 1.0 }
//! Itotal = { nominal = 1.0 }
//! ```
//!
//! Relative paths are taken relative to the folder holding the file.

mod error;
pub use error::*;

use std::path::{Path, PathBuf};
use std::time::Duration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use crate::params::{Distribution, Parameter, ParameterError, ParameterSpace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Verify,
    Margin,
    Yield,
    Optimize,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verify => write!(f, "verify"),
            Self::Margin => write!(f, "margin"),
            Self::Yield => write!(f, "yield"),
            Self::Optimize => write!(f, "optimize"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub mode: Mode,
    pub verify: VerifyConfig,

    #[serde(default)]
    pub parameters: IndexMap<String, ParameterConfig>,

    #[serde(default)]
    pub margin: MarginConfig,

    #[serde(default, rename = "yield")]
    pub yield_analysis: Option<YieldConfig>,

    #[serde(default)]
    pub optimize: Option<OptimizeConfig>,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VerifyMethod {
    #[default]
    #[serde(rename = "spec_file")]
    SpecFile,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    #[serde(default)]
    pub method: VerifyMethod,
    /// Base netlist handed to the simulator
    pub circuit: PathBuf,
    /// Spec file with the expected switching
    pub file: PathBuf,
    /// Allowed deviation, in flux quanta
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Read the netlist with WRspice conventions
    #[serde(default)]
    pub wrspice_compatibility: bool,
}

fn default_threshold() -> f64 {
    0.05
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterConfig {
    pub nominal: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Shorthand for a normal distribution with this standard deviation
    pub variance: Option<f64>,
    pub distribution: Option<Distribution>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarginConfig {
    /// Upper search bound as a factor of the center value
    pub max_search: f64,
    /// Lower search bound as a factor of the center value
    pub min_search: f64,
    pub scan_steps: usize,
    pub binary_search_steps: usize,
    /// Restrict the analysis to these parameters
    pub parameters: Option<Vec<String>>,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            max_search: 1.9,
            min_search: 0.1,
            scan_steps: 4,
            binary_search_steps: 3,
            parameters: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct YieldConfig {
    pub num_samples: usize,
    /// Random when unset, the value used is logged
    pub seed: Option<u64>,
    /// Keep every sampled assignment in the result
    #[serde(default)]
    pub keep_samples: bool,
    /// Per parameter distributions, overriding the [parameters] table
    #[serde(default)]
    pub distributions: IndexMap<String, Distribution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeMethod {
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeConfig {
    pub method: OptimizeMethod,
    /// Half width of the search box, relative to the current best
    pub search_radius: f64,
    /// Relative gap between estimated and analyzed score that stops the search
    pub converge: f64,
    pub max_iterations: usize,
    /// Random points scored by the estimator per iteration
    pub candidates: usize,
    pub seed: Option<u64>,
    /// Write the optimized parameters here as JSON
    pub output: Option<PathBuf>,
    /// Parameters the optimizer may move, all when unset
    pub parameters: Option<Vec<String>>,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            method: OptimizeMethod::Hybrid,
            search_radius: 0.05,
            converge: 0.01,
            max_iterations: 1000,
            candidates: 64,
            seed: None,
            output: None,
            parameters: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Shell command with `{input}` and `{output}` placeholders, JoSIM if unset
    pub command: Option<String>,
    /// Seconds a single simulation may take
    pub timeout: Option<f64>,
    pub threads: Option<usize>,
    pub temp_folder: Option<PathBuf>,
}

impl SimulatorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let mut config = Self::parse(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.verify.circuit);
        resolve(&mut self.verify.file);
        if let Some(output) = self.optimize.as_mut().and_then(|o| o.output.as_mut()) {
            resolve(output);
        }
        if let Some(temp_folder) = self.simulator.temp_folder.as_mut() {
            resolve(temp_folder);
        }
    }

    /// Value checks that need no parameter lookup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.verify.threshold.is_finite() && self.verify.threshold > 0.0) {
            return Err(ConfigError::invalid("verify.threshold", "must be a positive number"));
        }

        if self.mode != Mode::Verify && self.parameters.is_empty() {
            return Err(ConfigError::invalid("parameters", format!("mode '{}' needs at least one parameter", self.mode)));
        }

        let margin = &self.margin;
        if !(margin.max_search.is_finite() && margin.max_search > 1.0) {
            return Err(ConfigError::invalid("margin.max_search", "must be greater than 1"));
        }
        if !(margin.min_search >= 0.0 && margin.min_search < 1.0) {
            return Err(ConfigError::invalid("margin.min_search", "must be in [0, 1)"));
        }
        if margin.scan_steps == 0 {
            return Err(ConfigError::invalid("margin.scan_steps", "must be at least 1"));
        }

        match self.mode {
            Mode::Yield => {
                let yield_analysis = self.yield_analysis.as_ref().ok_or(ConfigError::MissingTable("yield", "yield"))?;
                if yield_analysis.num_samples == 0 {
                    return Err(ConfigError::invalid("yield.num_samples", "yield over zero samples is undefined"));
                }
            }
            Mode::Optimize => {
                let optimize = self.optimize.as_ref().ok_or(ConfigError::MissingTable("optimize", "optimize"))?;
                if !(optimize.search_radius > 0.0 && optimize.search_radius < 1.0) {
                    return Err(ConfigError::invalid("optimize.search_radius", "must be in (0, 1)"));
                }
                if !(optimize.converge.is_finite() && optimize.converge > 0.0) {
                    return Err(ConfigError::invalid("optimize.converge", "must be a positive number"));
                }
                if optimize.max_iterations == 0 {
                    return Err(ConfigError::invalid("optimize.max_iterations", "must be at least 1"));
                }
                if optimize.candidates == 0 {
                    return Err(ConfigError::invalid("optimize.candidates", "must be at least 1"));
                }
            }
            Mode::Verify | Mode::Margin => {}
        }

        if let Some(timeout) = self.simulator.timeout {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(ConfigError::invalid("simulator.timeout", "must be a positive number of seconds"));
            }
        }
        if self.simulator.threads == Some(0) {
            return Err(ConfigError::invalid("simulator.threads", "must be at least 1"));
        }

        Ok(())
    }

    /// Build the parameter definitions, every name referenced by the mode
    /// tables must be defined in [parameters]
    pub fn parameter_space(&self) -> Result<ParameterSpace, ParameterError> {
        let overrides = self.yield_analysis.as_ref().map(|y| &y.distributions);

        let space = ParameterSpace::new(self.parameters.iter().map(|(name, config)| {
            let distribution = overrides
                .and_then(|o| o.get(name).copied())
                .or(config.distribution)
                .or(config.variance.map(|sigma| Distribution::Normal { sigma }))
                .unwrap_or_default();

            Parameter::new(name.clone(), config.nominal)
                .with_bounds(config.min, config.max)
                .with_distribution(distribution)
        }))?;

        if let Some(names) = &self.margin.parameters {
            space.validate_references(names.iter().map(|s| s.as_str()))?;
        }
        if let Some(names) = self.optimize.as_ref().and_then(|o| o.parameters.as_ref()) {
            space.validate_references(names.iter().map(|s| s.as_str()))?;
        }
        if let Some(overrides) = overrides {
            space.validate_references(overrides.keys().map(|s| s.as_str()))?;
        }

        Ok(space)
    }

    pub fn margin_parameters(&self) -> Vec<String> {
        match &self.margin.parameters {
            Some(names) => names.clone(),
            None => self.parameters.keys().cloned().collect(),
        }
    }

    pub fn optimize_parameters(&self) -> Vec<String> {
        match self.optimize.as_ref().and_then(|o| o.parameters.as_ref()) {
            Some(names) => names.clone(),
            None => self.parameters.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARGIN: &str = r#"
mode = "margin"

[verify]
method = "spec_file"
circuit = "data/splitter.cir"
file = "data/splitter.spec"

[parameters]
Btotal = { nominal = 1 }
Ltotal = { nominal = 1 }
Itotal = { nominal = 1 }
"#;

    #[test]
    fn test_defaults() {
        let config = Config::parse(MARGIN).unwrap();
        assert_eq!(config.mode, Mode::Margin);
        assert_eq!(config.verify.threshold, 0.05);
        assert_eq!(config.margin.max_search, 1.9);
        assert_eq!(config.margin.min_search, 0.1);
        assert_eq!(config.margin.scan_steps, 4);
        assert_eq!(config.margin.binary_search_steps, 3);
        assert_eq!(config.margin_parameters(), ["Btotal", "Ltotal", "Itotal"]);
        assert!(config.simulator.command.is_none());
    }

    #[test]
    fn test_wrspice_compatibility() {
        assert!(!Config::parse(MARGIN).unwrap().verify.wrspice_compatibility);
        let content = MARGIN.replace("method = \"spec_file\"", "method = \"spec_file\"\nwrspice_compatibility = true");
        assert!(Config::parse(&content).unwrap().verify.wrspice_compatibility);
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = Config::parse(MARGIN).unwrap();
        config.resolve_paths(Path::new("/work"));
        assert_eq!(config.verify.circuit, Path::new("/work/data/splitter.cir"));
    }

    #[test]
    fn test_zero_samples_rejected() {
        let content = format!("{}\n[yield]\nnum_samples = 0\n", MARGIN.replace("\"margin\"", "\"yield\""));
        let err = Config::parse(&content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "yield.num_samples", .. }));
    }

    #[test]
    fn test_missing_mode_table() {
        let content = MARGIN.replace("\"margin\"", "\"optimize\"");
        assert!(matches!(Config::parse(&content), Err(ConfigError::MissingTable("optimize", _))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let content = format!("{}\n[margin]\nscan_step = 4\n", MARGIN);
        assert!(matches!(Config::parse(&content), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_parameter_reference() {
        let content = format!("{}\n[margin]\nparameters = [\"Btotal\", \"Jtotal\"]\n", MARGIN);
        let config = Config::parse(&content).unwrap();
        let err = config.parameter_space().unwrap_err();
        assert!(matches!(err, ParameterError::UnknownParameter(ref name) if name == "Jtotal"));
    }

    #[test]
    fn test_distribution_sources() {
        let content = r#"
mode = "yield"
[verify]
circuit = "c.cir"
file = "c.spec"
[parameters]
a = { nominal = 1.0, variance = 0.1 }
b = { nominal = 2.0, distribution = { kind = "uniform", low = 1.5, high = 2.5 } }
c = { nominal = 3.0, variance = 0.2 }
d = { nominal = 4.0 }
[yield]
num_samples = 10
[yield.distributions]
c = { kind = "nominal" }
"#;
        let space = Config::parse(content).unwrap().parameter_space().unwrap();
        assert_eq!(space.get("a").unwrap().distribution, Distribution::Normal { sigma: 0.1 });
        assert_eq!(space.get("b").unwrap().distribution, Distribution::Uniform { low: 1.5, high: 2.5 });
        assert_eq!(space.get("c").unwrap().distribution, Distribution::Nominal);
        assert_eq!(space.get("d").unwrap().distribution, Distribution::Nominal);
    }

    #[test]
    fn test_optimize_table() {
        let content = format!("{}\n[optimize]\nmethod = \"hybrid\"\nsearch_radius = 0.1\nparameters = [\"Itotal\"]\n", MARGIN.replace("\"margin\"", "\"optimize\""));
        let config = Config::parse(&content).unwrap();
        let optimize = config.optimize.as_ref().unwrap();
        assert_eq!(optimize.search_radius, 0.1);
        assert_eq!(optimize.converge, 0.01);
        assert_eq!(optimize.max_iterations, 1000);
        assert_eq!(config.optimize_parameters(), ["Itotal"]);
    }
}
