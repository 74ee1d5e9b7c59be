use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use crate::params::ParameterAssignment;
use crate::simulate::{SimulateError, SimulateResult};

static PARAM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\.param\s+(.*)$").expect("valid .param regex")
});

static PARAM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*=").expect("valid parameter name regex")
});

static OUTPUT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\.(print|plot|save)\b").expect("valid output regex")
});

static INCLUDE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^(\s*\.(?:include|file)\s+)(?:"([^"]+)"|(\S+))(.*)$"#).expect("valid .include regex")
});

static END_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\.end\s*$").expect("valid .end regex")
});

/// Writes the netlist handed to the simulator
pub struct NetlistWritor {
    input_path: PathBuf,
    file: File,
}

impl NetlistWritor {
    pub fn open<P: Into<PathBuf>>(input_path: P) -> SimulateResult<Self> {
        let input_path = input_path.into();
        let file = File::create(&input_path).map_err(SimulateError::WriteInput)?;
        Ok(Self { input_path, file })
    }

    pub fn close(mut self) -> SimulateResult<PathBuf> {
        self.file.flush().map_err(SimulateError::WriteInput)?;
        Ok(self.input_path)
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }
}

impl NetlistWritor {
    /// Copy `netlist`, overriding the `.param` lines named in `assignment`
    /// and replacing every output directive with phase prints of `probes`.
    /// Relative `.include` and `.file` paths are resolved against `circuit_dir`.
    pub fn write_circuit(
        &mut self,
        netlist: &str,
        circuit_dir: &Path,
        assignment: &ParameterAssignment,
        probes: &[String],
    ) -> SimulateResult<()> {
        let mut replaced = HashSet::new();
        let mut ended = false;

        for line in netlist.lines() {
            if ended {
                // everything after .end is ignored by the simulator
                break;
            }

            if let Some(captures) = PARAM_LINE.captures(line) {
                if let Some(rewritten) = rewrite_params(&captures[1], assignment, &mut replaced) {
                    self.write_content(rewritten)?;
                    continue;
                }
            } else if OUTPUT_LINE.is_match(line) {
                continue;
            } else if let Some(captures) = INCLUDE_LINE.captures(line) {
                let path = captures.get(2).or(captures.get(3)).map_or("", |m| m.as_str());
                let path = Path::new(path);
                if path.is_relative() {
                    let resolved = circuit_dir.join(path);
                    self.write_content(format!("{}\"{}\"{}\n", &captures[1], resolved.display(), &captures[4]))?;
                    continue;
                }
            } else if END_LINE.is_match(line) {
                ended = true;
                continue;
            }

            self.write_content(line)?;
            self.write_content("\n")?;
        }

        if let Some(missing) = assignment.names().find(|name| !replaced.contains(*name)) {
            return Err(SimulateError::UnknownNetlistParameter(missing.to_string()));
        }

        for probe in probes {
            self.write_print_phase(probe)?;
        }
        self.write_end()
    }

    pub fn write_content(&mut self, content: impl AsRef<str>) -> SimulateResult<()> {
        write!(self.file, "{}", content.as_ref()).map_err(SimulateError::WriteInput)
    }

    pub fn write_comment(&mut self, comment: impl AsRef<str>) -> SimulateResult<()> {
        writeln!(self.file, "* {}", comment.as_ref()).map_err(SimulateError::WriteInput)
    }

    pub fn write_print_phase(&mut self, probe: impl AsRef<str>) -> SimulateResult<()> {
        writeln!(self.file, ".print phase {}", probe.as_ref()).map_err(SimulateError::WriteInput)
    }

    pub fn write_end(&mut self) -> SimulateResult<()> {
        writeln!(self.file, ".end").map_err(SimulateError::WriteInput)
    }
}

/// `.param` line with the overridden assignments of `body` replaced in place,
/// `None` when nothing on the line is overridden. Each value runs up to the
/// next `name=` so expressions with spaces stay whole.
fn rewrite_params(body: &str, assignment: &ParameterAssignment, replaced: &mut HashSet<String>) -> Option<String> {
    let names: Vec<_> = PARAM_NAME.captures_iter(body).filter_map(|c| c.get(1)).collect();
    let mut overridden = false;
    let mut items = Vec::with_capacity(names.len());

    for (i, name) in names.iter().enumerate() {
        let end = names.get(i + 1).map_or(body.len(), |next| next.start());
        match assignment.iter().find(|(key, _)| key.eq_ignore_ascii_case(name.as_str())) {
            Some((key, value)) => {
                items.push(format!("{}={:e}", name.as_str(), value));
                replaced.insert(key.to_string());
                overridden = true;
            }
            None => items.push(body[name.start()..end].trim().to_string()),
        }
    }

    overridden.then(|| format!(".param {}\n", items.join(" ")))
}
