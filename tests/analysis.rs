mod common;

use std::path::Path;
use std::sync::Arc;
use approx::assert_relative_eq;
use common::{config, data, SplitterModel};
use josim_tools::{
    analysis::{AnalysisError, CancelToken, OptimizationStatus, Outcome, PartialResult},
    config::{Config, ConfigError, Mode},
    params::{ParameterAssignment, ParameterError},
    run::{Report, Session},
    simulate::{ExecuteCommand, SimulateError},
    verify::SpecError,
    JosimToolsError,
};

#[test]
fn test_margin_with_fake_simulator() {
    let config = Config::load(data("margin.toml")).unwrap();
    let session = Session::new(config).unwrap();
    let adapter = Arc::new(session.josim_adapter().unwrap());

    let report = session.run(adapter, CancelToken::new()).unwrap();
    let Report::Margin(result) = &report else { panic!("expected a margin report") };

    let btotal = result.get("Btotal").unwrap();
    assert_relative_eq!(btotal.lower, -0.39375, epsilon = 1e-9);
    assert_relative_eq!(btotal.upper, 0.478125, epsilon = 1e-9);
    let ltotal = result.get("Ltotal").unwrap();
    assert_relative_eq!(ltotal.lower, -0.675, epsilon = 1e-9);
    assert_relative_eq!(ltotal.upper, 0.675, epsilon = 1e-9);
    let itotal = result.get("Itotal").unwrap();
    assert_relative_eq!(itotal.lower, -0.225, epsilon = 1e-9);
    assert_relative_eq!(itotal.upper, 0.196875, epsilon = 1e-9);

    assert_eq!(result.critical.labels, ["Itotal+"]);
    assert!(report.to_string().ends_with("Critical margin: 19.7 % ['Itotal+']\n"));
}

#[test]
fn test_nominal_verifies() {
    let mut config = Config::load(data("margin.toml")).unwrap();
    config.mode = Mode::Verify;
    let session = Session::new(config).unwrap();
    let adapter = Arc::new(session.josim_adapter().unwrap());

    match session.run(adapter, CancelToken::new()).unwrap() {
        Report::Verify(report) => {
            assert!(report.outcome.passed());
            assert!(report.to_string().ends_with("Verification: PASS\n"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_margin_with_model() {
    let session = Session::new(config("margin", "")).unwrap();
    let model = Arc::new(SplitterModel::new());

    let Report::Margin(result) = session.run(model.clone(), CancelToken::new()).unwrap() else {
        panic!("expected a margin report")
    };
    assert_relative_eq!(result.critical_margin(), 0.196875, epsilon = 1e-9);
    assert!(model.calls() > 1);
}

#[test]
fn test_spec_column_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("broken.spec");
    std::fs::write(&spec, "time B1|X1 B2|X1\n0 0 0\n100e-12 1\n").unwrap();

    let mut config = config("margin", "");
    config.verify.file = spec;

    let err = Session::new(config).err().unwrap();
    assert!(matches!(err, JosimToolsError::Spec(SpecError::ColumnCountMismatch { line: 3, expected: 3, found: 2 })));
}

#[test]
fn test_unknown_parameter_before_any_simulation() {
    let model = Arc::new(SplitterModel::new());

    for extra in [
        "[margin]\nparameters = [\"Btotal\", \"Jtotal\"]\n",
        "[optimize]\nparameters = [\"Jtotal\"]\n",
    ] {
        let config = config("margin", extra);
        match Session::new(config) {
            Err(JosimToolsError::Parameter(ParameterError::UnknownParameter(name))) => assert_eq!(name, "Jtotal"),
            Err(e) => panic!("unexpected {}", e),
            Ok(session) => {
                session.run(model.clone(), CancelToken::new()).ok();
                panic!("unknown parameter accepted");
            }
        }
    }

    assert_eq!(model.calls(), 0);
}

#[test]
fn test_zero_samples_is_config_error() {
    let content = std::fs::read_to_string(data("margin.toml")).unwrap()
        .replace("mode = \"margin\"", "mode = \"yield\"")
        + "\n[yield]\nnum_samples = 0\n";
    assert!(matches!(Config::parse(&content), Err(ConfigError::InvalidValue { field: "yield.num_samples", .. })));
}

#[test]
fn test_yield_is_reproducible() {
    let extra = r#"
[yield]
num_samples = 300
seed = 7
[yield.distributions]
Itotal = { kind = "normal", sigma = 0.15 }
"#;
    let session = Session::new(config("yield", extra)).unwrap();

    let run = || match session.run(Arc::new(SplitterModel::new()), CancelToken::new()).unwrap() {
        Report::Yield(result) => result,
        other => panic!("unexpected {:?}", other),
    };
    let first = run();
    let second = run();

    assert_eq!(first.passes, second.passes);
    assert_eq!(first.total, 300);
    assert_eq!(first.seed, 7);
    // P(-1.67 < z < 1.33) is about 0.86
    assert!(first.fraction() > 0.75 && first.fraction() < 0.95);
}

#[test]
fn test_optimize_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("optimized.json");
    let extra = format!(
        "[margin]\nbinary_search_steps = 8\n[optimize]\nmax_iterations = 8\nseed = 5\nparameters = [\"Itotal\"]\noutput = \"{}\"\n",
        output.display()
    );
    let session = Session::new(config("optimize", &extra)).unwrap();

    let Report::Optimize(state) = session.run(Arc::new(SplitterModel::new()), CancelToken::new()).unwrap() else {
        panic!("expected an optimize report")
    };
    assert!(state.best_score >= state.nominal_score);
    assert_ne!(state.status, OptimizationStatus::Running);
    assert!(SplitterModel::passes(&state.best));

    let written: ParameterAssignment = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    for (name, value) in state.best.iter() {
        assert_relative_eq!(written.get(name).unwrap(), value, max_relative = 1e-12);
    }
    assert!(Report::Optimize(state).to_string().contains(".param Btotal=1\n"));
}

fn optimize_into(output: &Path) -> Session {
    let extra = format!(
        "[margin]\nbinary_search_steps = 6\n[optimize]\nmax_iterations = 3\nseed = 5\nparameters = [\"Itotal\"]\noutput = \"{}\"\n",
        output.display()
    );
    Session::new(config("optimize", &extra)).unwrap()
}

#[test]
fn test_optimize_creates_output_folder() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("results").join("best.json");

    let session = optimize_into(&output);
    session.run(Arc::new(SplitterModel::new()), CancelToken::new()).unwrap();
    assert!(output.exists());
}

#[test]
fn test_optimize_output_failure_keeps_best() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();

    let session = optimize_into(&blocker.join("best.json"));
    match session.run(Arc::new(SplitterModel::new()), CancelToken::new()) {
        Err(JosimToolsError::Analysis(AnalysisError::Aborted { partial: PartialResult::Optimize(state), .. })) => {
            assert!(state.best_score >= state.nominal_score);
            assert!(state.best.get("Itotal").is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_cancelled_before_start() {
    let session = Session::new(config("margin", "")).unwrap();
    let model = Arc::new(SplitterModel::new());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = session.run(model.clone(), cancel).err().unwrap();
    assert!(matches!(err, JosimToolsError::Analysis(AnalysisError::Cancelled)));
    assert_eq!(model.calls(), 0);
}

#[test]
fn test_wrspice_compatibility_reaches_josim() {
    let mut config = config("verify", "");
    config.verify.wrspice_compatibility = true;
    let adapter = Session::new(config).unwrap().josim_adapter().unwrap();

    let line = adapter.command.simulate_command(Path::new("in.cir"), Path::new("out.csv"));
    assert!(line.starts_with("josim-cli -c 2 -o out.csv in.cir"));
}

#[test]
fn test_timeout_counts_as_fail() {
    let extra = "[simulator]\ncommand = \"sleep 5\"\ntimeout = 0.2\n";
    let session = Session::new(config("verify", extra)).unwrap();
    let adapter = Arc::new(session.josim_adapter().unwrap());

    match session.run(adapter, CancelToken::new()).unwrap() {
        Report::Verify(report) => assert!(matches!(report.outcome, Outcome::SimulationFailed(_))),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unknown_netlist_parameter_is_fatal() {
    let content = std::fs::read_to_string(data("margin.toml")).unwrap()
        .replace("mode = \"margin\"", "mode = \"verify\"")
        .replace("Itotal = { nominal = 1.0 }", "Itotal = { nominal = 1.0 }\nKtotal = { nominal = 1.0 }");
    let mut config = Config::parse(&content).unwrap();
    config.verify.circuit = data("splitter.cir");
    config.verify.file = data("splitter.spec");

    let session = Session::new(config).unwrap();
    let adapter = Arc::new(session.josim_adapter().unwrap());
    let err = session.run(adapter, CancelToken::new()).err().unwrap();
    assert!(matches!(err, JosimToolsError::Simulate(SimulateError::UnknownNetlistParameter(ref name)) if name == "Ktotal"));
}
