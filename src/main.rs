//! PV plant simulator entry point: CLI wiring and config-driven engine construction.

use std::path::{Path, PathBuf};
use std::process;

use tracing::error;

use pv_plant_sim::config::ScenarioConfig;
use pv_plant_sim::error::SimResult;
use pv_plant_sim::inverter::InverterModel;
use pv_plant_sim::io::export::export_csv;
use pv_plant_sim::logging::{self, DEFAULT_LOG_LEVEL};
use pv_plant_sim::pv::{PvArray, PvModule};
use pv_plant_sim::sim::controller::OperatingPointController;
use pv_plant_sim::sim::engine::Engine;
use pv_plant_sim::sim::kpi::EnergyReport;
use pv_plant_sim::sim::types::StepResult;
use pv_plant_sim::weather::{self, SyntheticWeather};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    weather_path: Option<String>,
    seed_override: Option<u64>,
    telemetry_out: Option<String>,
    log_level: String,
    quiet: bool,
}

fn print_help() {
    eprintln!("pv-plant-sim — grid-connected photovoltaic plant simulator");
    eprintln!();
    eprintln!("Usage: pv-plant-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --weather <path>         Read plane-of-array weather from CSV");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --telemetry-out <path>   Export step results to CSV");
    eprintln!("  --log-level <level>      trace, debug, info, warn, error (default: warn)");
    eprintln!("  --quiet                  Print only the energy report");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("RUST_LOG overrides --log-level when set.");
}

/// Returns the value following a flag, exiting when it is missing.
fn flag_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        weather_path: None,
        seed_override: None,
        telemetry_out: None,
        log_level: DEFAULT_LOG_LEVEL.to_string(),
        quiet: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path = Some(flag_value(&args, i, "--scenario", "a path argument"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(flag_value(&args, i, "--preset", "a name argument"));
            }
            "--weather" => {
                i += 1;
                cli.weather_path = Some(flag_value(&args, i, "--weather", "a path argument"));
            }
            "--seed" => {
                i += 1;
                let raw = flag_value(&args, i, "--seed", "a u64 argument");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--telemetry-out" => {
                i += 1;
                cli.telemetry_out =
                    Some(flag_value(&args, i, "--telemetry-out", "a path argument"));
            }
            "--log-level" => {
                i += 1;
                let level = flag_value(&args, i, "--log-level", "a level argument");
                if !logging::is_valid_level(&level) {
                    eprintln!(
                        "error: --log-level must be one of {}, got \"{level}\"",
                        logging::LOG_LEVELS.join(", ")
                    );
                    process::exit(1);
                }
                cli.log_level = level;
            }
            "--quiet" | "-q" => {
                cli.quiet = true;
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Calibrates the module and wires array, inverter, weather and engine.
fn build_scenario(cfg: &ScenarioConfig) -> SimResult<Engine> {
    let sim_config = cfg.simulation.sim_config();

    let module = PvModule::calibrate(cfg.module.clone())?;
    let array = PvArray::new(module, cfg.array.clone())?;
    let inverter = InverterModel::new(cfg.inverter.clone())?;
    let controller = OperatingPointController::new(array, inverter);

    let records = match &cfg.simulation.weather_csv {
        Some(path) => weather::read_csv(path)?,
        None => SyntheticWeather::new(cfg.simulation.synthetic_params(), &sim_config).generate(),
    };

    Ok(Engine::new(sim_config, controller, records))
}

/// Runs the simulation and returns results and the energy report.
fn run_simulation(cfg: &ScenarioConfig) -> SimResult<(Vec<StepResult>, EnergyReport)> {
    let mut engine = build_scenario(cfg)?;
    let results = engine.run();
    let nominal_kwp = engine.controller().array().nominal_power_w() / 1000.0;
    let report = EnergyReport::from_results(&results, engine.config().dt_hours, nominal_kwp);
    Ok((results, report))
}

fn main() {
    let cli = parse_args();
    logging::init_logging(&cli.log_level);

    // Load config: --scenario takes priority, then --preset, then baseline default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(ref path) = cli.weather_path {
        scenario.simulation.weather_csv = Some(PathBuf::from(path));
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let (results, report) = match run_simulation(&scenario) {
        Ok(out) => out,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    if !cli.quiet {
        for r in &results {
            println!("{r}");
        }
        println!();
    }
    println!("{report}");

    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(&results, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }
}
