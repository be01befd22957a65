use std::process::{Command, Output};

#[derive(Debug)]
struct Kpis {
    ac_energy_kwh: f64,
    clipping_loss_kwh: f64,
    below_min_voltage_loss_kwh: f64,
    performance_ratio: f64,
}

#[test]
fn scenario_presets_run_via_cli_and_produce_distinct_losses() {
    let baseline = run_and_parse_kpis(&["--preset", "baseline"]);
    let clipping = run_and_parse_kpis(&["--preset", "clipping"]);
    let short_string = run_and_parse_kpis(&["--preset", "short_string"]);

    assert!(
        clipping.clipping_loss_kwh > baseline.clipping_loss_kwh + 1.0,
        "expected the undersized inverter to clip more: baseline={:.3}, clipping={:.3}",
        baseline.clipping_loss_kwh,
        clipping.clipping_loss_kwh
    );

    assert!(
        short_string.below_min_voltage_loss_kwh > baseline.below_min_voltage_loss_kwh + 1.0,
        "expected short strings to lose energy below the window: baseline={:.3}, short_string={:.3}",
        baseline.below_min_voltage_loss_kwh,
        short_string.below_min_voltage_loss_kwh
    );

    for kpis in [&baseline, &clipping, &short_string] {
        assert!(kpis.ac_energy_kwh > 0.0, "{kpis:?}");
        assert!(kpis.performance_ratio > 0.0 && kpis.performance_ratio < 1.0, "{kpis:?}");
    }
}

#[test]
fn scenario_files_match_builtin_presets() {
    for name in ["baseline", "clipping", "short_string"] {
        let path = format!("scenarios/{name}.toml");
        let from_file = run_and_parse_kpis(&["--scenario", &path, "--quiet"]);
        let from_preset = run_and_parse_kpis(&["--preset", name, "--quiet"]);
        assert!(
            (from_file.ac_energy_kwh - from_preset.ac_energy_kwh).abs() < 1e-3,
            "{name}: file={:.3}, preset={:.3}",
            from_file.ac_energy_kwh,
            from_preset.ac_energy_kwh
        );
    }
}

#[test]
fn weather_file_replaces_synthetic_series() {
    let output = run(&["--weather", "data/sample_weather.csv"]);
    assert_success(&output, "--weather");
    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    let step_lines = stdout.lines().filter(|l| l.starts_with("t=")).count();
    assert_eq!(step_lines, 24);
    assert!(parse_kpis(&stdout).ac_energy_kwh > 0.0);
}

#[test]
fn seed_override_changes_the_run() {
    let a = run_and_parse_kpis(&["--seed", "1", "--quiet"]);
    let b = run_and_parse_kpis(&["--seed", "2", "--quiet"]);
    assert!((a.ac_energy_kwh - b.ac_energy_kwh).abs() > 1e-3);
}

#[test]
fn telemetry_export_writes_one_row_per_step() {
    let path = std::env::temp_dir().join(format!("pv-plant-sim-{}.csv", std::process::id()));
    let path_str = path.to_string_lossy().to_string();
    let output = run(&["--quiet", "--telemetry-out", &path_str]);
    assert_success(&output, "--telemetry-out");

    let csv = std::fs::read_to_string(&path).expect("telemetry file should exist");
    assert_eq!(csv.lines().count(), 25);
    assert!(csv.starts_with("timestep,"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn unknown_preset_exits_with_error() {
    let output = run(&["--preset", "nonexistent"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown preset"), "stderr={stderr}");
}

#[test]
fn invalid_log_level_exits_with_error() {
    let output = run(&["--log-level", "verbose"]);
    assert_eq!(output.status.code(), Some(1));
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pv-plant-sim"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("pv-plant-sim process should run")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "run failed for {what}: stderr={} ",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn run_and_parse_kpis(args: &[&str]) -> Kpis {
    let output = run(args);
    assert_success(&output, &args.join(" "));
    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    parse_kpis(&stdout)
}

fn parse_kpis(stdout: &str) -> Kpis {
    Kpis {
        ac_energy_kwh: parse_metric(stdout, "AC energy:", "kWh"),
        clipping_loss_kwh: parse_metric(stdout, "Clipping loss:", "kWh"),
        below_min_voltage_loss_kwh: parse_metric(stdout, "Below-min-voltage loss:", "kWh"),
        performance_ratio: parse_metric(stdout, "Performance ratio:", ""),
    }
}

fn parse_metric(stdout: &str, label: &str, unit: &str) -> f64 {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing report line `{label}` in output: {stdout}"));

    let raw = line
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid report format for line `{line}`"));

    let value = raw.strip_suffix(unit).unwrap_or(raw).trim();
    value
        .parse::<f64>()
        .unwrap_or_else(|e| panic!("failed to parse `{value}` for `{label}`: {e}"))
}
