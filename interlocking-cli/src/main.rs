//! Interlocking Simulator CLI Application
//!
//! This is the command-line interface for the interlocking engine.
//! It uses the interlocking-core library and adds:
//! - Loading master data and live state from JSON files
//! - TOML configuration with command-line overrides
//! - Running a number of evaluation cycles
//! - Text and JSON reports of relay changes and signal aspects

use anyhow::{Context, Result};
use clap::Parser;
use interlocking_core::{Interlocking, InterlockingState, PlantData};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::RunReport;

/// Interlocking Simulator - Evaluate relay interlocking and signal aspects
#[derive(Parser, Debug)]
#[command(name = "interlocking-cli")]
#[command(about = "Run relay interlocking cycles over plant master data", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the plant master data (JSON)
    #[arg(short, long, value_name = "FILE")]
    plant: Option<PathBuf>,

    /// Path to a live state to start from (JSON)
    #[arg(short, long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of evaluation cycles to run
    #[arg(short = 'n', long, value_name = "COUNT")]
    cycles: Option<usize>,

    /// Signal whose aspect is reported (can be repeated; default: all)
    #[arg(long, value_name = "NAME")]
    signal: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Interlocking CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using interlocking library v{}", interlocking_core::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    apply_args(&mut config, &args);
    config.validate()?;

    let report = run(&config)?;
    match config.output.format {
        OutputFormat::Txt => print!("{}", report::render_txt(&report)),
        OutputFormat::Json => println!("{}", report::render_json(&report)?),
    }

    Ok(())
}

/// Command-line flags override the configuration file
fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(plant) = &args.plant {
        config.input.plant = Some(plant.clone());
    }
    if let Some(state) = &args.state {
        config.input.state = Some(state.clone());
    }
    if let Some(cycles) = args.cycles {
        config.run.cycles = cycles;
    }
    if !args.signal.is_empty() {
        config.output.signals = args.signal.clone();
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
}

/// Load the engine, run the configured cycles and collect the report
fn run(config: &AppConfig) -> Result<RunReport> {
    let plant_path = config
        .input
        .plant
        .as_deref()
        .context("No plant file given (use --plant or [input] plant)")?;

    let data: PlantData = load_json(plant_path)?;
    let interlocking = Interlocking::from_data(&data, config.engine.clone(), chrono::Utc::now())
        .with_context(|| format!("Failed to load interlocking from {:?}", plant_path))?;

    let stats = interlocking.plant_stats();
    log::info!(
        "Loaded {} objects in {} plants, {} lock-table trees, {} signals",
        stats.num_objects,
        stats.num_plants,
        interlocking.lock_table().len(),
        interlocking.signals().len()
    );

    if let Some(state_path) = &config.input.state {
        let state: InterlockingState = load_json(state_path)?;
        interlocking.replace_state(state)?;
        log::info!("Live state loaded from: {:?}", state_path);
    }

    let mut report = RunReport::default();
    for cycle in 1..=config.run.cycles {
        let sweep = interlocking
            .run_cycle()
            .with_context(|| format!("Evaluation cycle {} failed", cycle))?;
        report.add_cycle(cycle, &sweep, interlocking.plant());
    }
    log::info!("{} cycles run, {} relay changes", config.run.cycles, report.total_changes());

    report.aspects = if config.output.signals.is_empty() {
        interlocking.all_aspects()?
    } else {
        interlocking.aspects(config.output.signals.as_slice())?
    };

    Ok(report)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON file: {:?}", path))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PLANT_JSON: &str = r#"{
        "objects": [
            {"id": 1, "name": "TH71_1", "kind": "Lever", "plant": "TH71"},
            {"id": 10, "name": "TH71_1RA", "kind": "Route", "plant": "TH71"},
            {"id": 30, "name": "TH71_3T", "kind": "TrackCircuit", "plant": "TH71"}
        ],
        "routes": [{"id": 10, "lever": 1, "destination_button": "TH71_AP"}],
        "lock_table": [{"plant": "TH71", "object": "TH71_1RA", "column": "SignalControl", "raw": "3T"}],
        "signals": [{"name": "TH71_1R", "type_name": "3灯", "track_circuit": 30, "routes": [10]}],
        "signal_types": [{"name": "3灯", "r": "Y", "yy": "Y", "y": "G", "yg": "G", "g": "G"}]
    }"#;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from(["interlocking-cli", "--plant", "a.json", "-n", "3", "--signal", "S1", "--json"]);
        let mut config = AppConfig::default();
        config.input.plant = Some(PathBuf::from("b.json"));
        apply_args(&mut config, &args);

        assert_eq!(config.input.plant, Some(PathBuf::from("a.json")));
        assert_eq!(config.run.cycles, 3);
        assert_eq!(config.output.signals, vec!["S1".to_string()]);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_zero_cycles_from_args_rejected() {
        let args = Args::parse_from(["interlocking-cli", "--plant", "a.json", "-n", "0"]);
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        apply_args(&mut config, &args);
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("at least 1"));
    }

    #[test]
    fn test_run_with_state_file() {
        let plant = write_temp(PLANT_JSON);
        let state = write_temp(
            r#"{
                "now": "2024-04-01T09:00:00Z",
                "routes": {"10": {"lever_relay": false, "route_relay": false, "signal_control_relay": false,
                                  "throw_out_xr": false, "throw_out_ys": false}},
                "levers": {"1": "Right"},
                "buttons": {"TH71_AP": true},
                "track_circuits": {"30": {"occupied": false}}
            }"#,
        );

        let mut config = AppConfig::default();
        config.input.plant = Some(plant.path().to_path_buf());
        config.input.state = Some(state.path().to_path_buf());
        config.run.cycles = 2;

        let report = run(&config).unwrap();
        assert_eq!(report.cycles.len(), 2);
        assert_eq!(report.cycles[0].changes.len(), 3);
        assert!(report.cycles[1].changes.is_empty());
        assert_eq!(report.aspects["TH71_1R"], interlocking_core::Aspect::Y);
    }

    #[test]
    fn test_run_without_plant_fails() {
        let error = run(&AppConfig::default()).unwrap_err();
        assert!(error.to_string().contains("No plant file"));
    }

    #[test]
    fn test_run_reports_bad_json() {
        let plant = write_temp("{ not json");
        let mut config = AppConfig::default();
        config.input.plant = Some(plant.path().to_path_buf());
        let error = run(&config).unwrap_err();
        assert!(error.to_string().contains("Failed to parse JSON file"));
    }
}
