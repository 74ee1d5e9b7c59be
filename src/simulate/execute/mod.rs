mod josim;
mod template;
pub use josim::*;
pub use template::*;

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;
use super::{SimulateError, SimulateResult};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub trait ExecuteCommand: Send + Sync {
    /// Return the simulate command to execute
    fn simulate_command(&self, input: &Path, output: &Path) -> String;

    /// Run the command through `sh`, killing it once `timeout` has passed
    fn execute(&self, input: &Path, output: &Path, timeout: Option<Duration>) -> SimulateResult<()> {
        let command = self.simulate_command(input, output);
        debug!("execute '{}'", command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| SimulateError::ExecuteError(command.clone(), e.to_string()))?;

        let status = match timeout {
            None => child.wait().map_err(|e| SimulateError::ExecuteError(command.clone(), e.to_string()))?,
            Some(timeout) => {
                let start = Instant::now();
                loop {
                    let polled = child.try_wait().map_err(|e| SimulateError::ExecuteError(command.clone(), e.to_string()))?;
                    if let Some(status) = polled {
                        break status;
                    }
                    if start.elapsed() >= timeout {
                        kill_group(&mut child);
                        return Err(SimulateError::Timeout(command, timeout));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(SimulateError::ExitStatus(command, code)),
            None => Err(SimulateError::Killed(command)),
        }
    }
}

/// Kill the shell together with everything it forked. The shell leads its
/// own process group and is not reaped yet, so the group id is still valid.
fn kill_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only sends a signal, no memory is shared
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

impl ExecuteCommand for Box<dyn ExecuteCommand> {
    fn simulate_command(&self, input: &Path, output: &Path) -> String {
        self.as_ref().simulate_command(input, output)
    }

    fn execute(&self, input: &Path, output: &Path, timeout: Option<Duration>) -> SimulateResult<()> {
        self.as_ref().execute(input, output, timeout)
    }
}
