mod execute;
mod write;
mod trace;
mod error;
pub use execute::*;
pub use write::*;
pub use trace::*;
pub use error::*;

use std::path::{Path, PathBuf};
use std::time::Duration;
use derive_builder::Builder;
use tracing::debug;
use crate::params::ParameterAssignment;

/// Runs the external simulator for one parameter assignment.
///
/// Implementations own whatever session state the simulator needs and must
/// be usable from several worker threads at once.
pub trait SimulationAdapter: Send + Sync {
    fn run(&self, circuit_path: &Path, assignment: &ParameterAssignment) -> SimulateResult<SimulationTrace>;
}

/// JoSIM behind its command line.
///
/// Each run gets a fresh temporary folder holding the rewritten netlist and
/// the CSV output, the folder is removed when the run returns.
///
/// # Example
///
/// ```ignore
/// let adapter = JosimAdapterBuilder::default()
///     .probes(vec!["B1|X1".to_string()])
///     .timeout(Duration::from_secs(60))
///     .build()?;
/// let trace = adapter.run(Path::new("splitter.cir"), &assignment)?;
/// ```
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct JosimAdapter {
    /// Junctions to print, in spec file order
    #[builder(setter(into))]
    pub probes: Vec<String>,

    #[builder(default = "Box::new(JoSim::default())")]
    pub command: Box<dyn ExecuteCommand>,

    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,

    /// Parent of the per run folders, the system temp folder if unset
    #[builder(default, setter(strip_option, into))]
    pub temp_folder: Option<PathBuf>,
}

impl JosimAdapter {
    fn temp_dir(&self) -> SimulateResult<tempfile::TempDir> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("josim-");
            builder
        };
        match &self.temp_folder {
            Some(folder) => {
                std::fs::create_dir_all(folder).map_err(SimulateError::WriteInput)?;
                builder.tempdir_in(folder)
            }
            None => builder.tempdir(),
        }
        .map_err(SimulateError::WriteInput)
    }
}

impl SimulationAdapter for JosimAdapter {
    fn run(&self, circuit_path: &Path, assignment: &ParameterAssignment) -> SimulateResult<SimulationTrace> {
        let read_error = |e| SimulateError::ReadCircuit(circuit_path.to_path_buf(), e);
        let netlist = std::fs::read_to_string(circuit_path).map_err(read_error)?;
        let circuit_dir = std::path::absolute(circuit_path).map_err(read_error)?;
        let circuit_dir = circuit_dir.parent().unwrap_or(Path::new("/"));

        // dropped on every return path, removing both files
        let temp_dir = self.temp_dir()?;
        let input_path = temp_dir.path().join("input.cir");
        let output_path = temp_dir.path().join("output.csv");

        let mut writor = NetlistWritor::open(&input_path)?;
        writor.write_comment(format!("generated from {}", circuit_path.display()))?;
        writor.write_circuit(&netlist, circuit_dir, assignment, &self.probes)?;
        let input_path = writor.close()?;

        debug!("simulate '{}' in '{}'", circuit_path.display(), temp_dir.path().display());
        self.command.execute(&input_path, &output_path, self.timeout)?;

        load_josim_csv(&output_path, &self.probes)
    }
}
