use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::error::Error;
use std::path::Path;
use tempfile::tempdir;

/// Short recordings and kernels so the full pipeline stays quick
const FAST_CONFIG: &str = r#"
[kernels]
length = 100.0
binsize_ub = 100.0

[eta]
amplitude = 0.2
tau = 30.0

[gamma]
amplitude = 5.0
tau = 30.0

[stimulus]
duration_ms = 2000.0

[synthetic]
traces = 2
"#;

fn gif() -> Result<Command, Box<dyn Error>> {
    Ok(Command::cargo_bin("gif")?)
}

fn write_config(dir: &Path, text: &str) -> Result<String, Box<dyn Error>> {
    let path = dir.join("gif.toml");
    std::fs::write(&path, text)?;
    Ok(path.to_str().unwrap().to_string())
}

fn stdout_json(cmd: &mut Command) -> Result<Value, Box<dyn Error>> {
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

#[test]
fn help_lists_subcommands() -> Result<(), Box<dyn Error>> {
    gif()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("params"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("fit"));
    Ok(())
}

#[test]
fn params_prints_the_default_model() -> Result<(), Box<dyn Error>> {
    gif()?
        .arg("params")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vt*"))
        .stdout(predicate::str::contains("tau_m"));

    let json = stdout_json(gif()?.args(["params", "--json"]))?;
    assert_eq!(json["vt_star"].as_f64(), Some(-48.0));
    assert!(json["eta"]["values"].as_array().map_or(false, |v| !v.is_empty()));
    Ok(())
}

#[test]
fn params_follows_the_config_file() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = write_config(tmp.path(), "[params]\nvt_star = -52.5\n")?;

    let json = stdout_json(gif()?.args(["--config", &config, "params", "--json"]))?;
    assert_eq!(json["vt_star"].as_f64(), Some(-52.5));
    assert_eq!(json["gl"].as_f64(), Some(0.01));

    let saved = tmp.path().join("effective.toml");
    gif()?
        .args(["--config", &config, "params", "--save", saved.to_str().unwrap()])
        .assert()
        .success();
    let text = std::fs::read_to_string(&saved)?;
    assert!(text.contains("vt_star = -52.5"));
    Ok(())
}

#[test]
fn missing_config_fails() -> Result<(), Box<dyn Error>> {
    gif()?
        .args(["--config", "/nonexistent/gif.toml", "params"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    Ok(())
}

#[test]
fn simulate_is_reproducible() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = write_config(tmp.path(), FAST_CONFIG)?;
    let a = tmp.path().join("a.json");
    let b = tmp.path().join("b.json");

    for out in [&a, &b] {
        gif()?
            .args(["--config", &config, "simulate", "--seed", "3", "--output"])
            .arg(out)
            .assert()
            .success();
    }
    assert_eq!(std::fs::read_to_string(&a)?, std::fs::read_to_string(&b)?);

    let record: Value = serde_json::from_str(&std::fs::read_to_string(&a)?)?;
    let n = record["v"].as_array().unwrap().len();
    assert_eq!(n, 20_000);
    assert_eq!(record["time"].as_array().unwrap().len(), n);
    assert_eq!(record["v_t"].as_array().unwrap().len(), n);
    assert!(!record["spike_times"].as_array().unwrap().is_empty());

    gif()?
        .args(["--config", &config, "simulate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("spikes:"));
    Ok(())
}

#[test]
fn fit_recovers_a_simulated_trace() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = write_config(tmp.path(), FAST_CONFIG)?;
    let trace = tmp.path().join("trace.json");

    gif()?
        .args(["--config", &config, "simulate", "--seed", "5", "--output"])
        .arg(&trace)
        .assert()
        .success();

    let summary = stdout_json(
        gif()?
            .args(["--config", &config, "fit", "--json", "--traces"])
            .arg(&trace),
    )?;
    assert_eq!(summary["traces"].as_u64(), Some(1));
    assert!((summary["model"]["vr"].as_f64().unwrap() + 50.0).abs() < 1e-6);
    assert!((summary["model"]["gl"].as_f64().unwrap() - 0.01).abs() < 1e-6);
    assert!(summary["var_explained_dv"].as_f64().unwrap() > 0.999);
    assert!(summary["static_log_likelihood"].as_f64().unwrap().is_finite());
    assert!(summary["converged"].is_boolean());
    Ok(())
}

#[test]
fn fit_without_traces_uses_synthetic_data() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = write_config(tmp.path(), FAST_CONFIG)?;
    let out = tmp.path().join("fit.json");

    gif()?
        .args(["--config", &config, "fit", "--seed", "9", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("bits per spike"));

    let summary: Value = serde_json::from_str(&std::fs::read_to_string(&out)?)?;
    assert_eq!(summary["traces"].as_u64(), Some(2));
    Ok(())
}

#[test]
fn fit_with_missing_traces_fails() -> Result<(), Box<dyn Error>> {
    gif()?
        .args(["fit", "--traces", "/nonexistent/traces.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    Ok(())
}
