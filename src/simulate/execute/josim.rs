use std::path::Path;
use super::ExecuteCommand;

/// The JoSIM command line simulator, writing CSV output
#[derive(Debug, Clone)]
pub struct JoSim {
    pub executable: String,
    /// Pass `-c 2` so JoSIM reads the netlist with WRspice conventions
    pub wrspice: bool,
}

impl JoSim {
    pub fn wrspice() -> Self {
        Self { wrspice: true, ..Self::default() }
    }
}

impl Default for JoSim {
    fn default() -> Self {
        Self { executable: "josim-cli".into(), wrspice: false }
    }
}

impl ExecuteCommand for JoSim {
    fn simulate_command(&self, input: &Path, output: &Path) -> String {
        format!(
            "{}{} -o {} {} > /dev/null 2>&1",
            self.executable,
            if self.wrspice { " -c 2" } else { "" },
            output.display(),
            input.display(),
        )
    }
}
