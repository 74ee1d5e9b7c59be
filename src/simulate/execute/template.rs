use std::path::Path;
use super::ExecuteCommand;

/// A user supplied shell command line.
///
/// `{input}` is replaced by the netlist path and `{output}` by the path
/// the CSV result must be written to.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    pub template: String,
}

impl CommandTemplate {
    pub const INPUT: &'static str = "{input}";
    pub const OUTPUT: &'static str = "{output}";

    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }
}

impl ExecuteCommand for CommandTemplate {
    fn simulate_command(&self, input: &Path, output: &Path) -> String {
        self.template
            .replace(Self::INPUT, &input.display().to_string())
            .replace(Self::OUTPUT, &output.display().to_string())
    }
}
