use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use flightwatch::config::{Config, ConfigWatcher};
use flightwatch::engine::RiskEngine;
use flightwatch::error::ConfigError;
use flightwatch::ingest::JsonFileSource;
use flightwatch::monitoring::{run_once, MonitoringLoop};
use flightwatch::report::{render_summary, JsonReportSink, Report, ReportSink};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Command-line arguments for the operational risk engine
#[derive(Parser, Debug)]
#[command(
    name = "flightwatch",
    about = "Airline operational risk aggregation and alerting engine",
    long_about = "Aggregates flight, aircraft, booking, crew and route records, scores delay, \
                  health, load, crew and route risk, and publishes tiered alerts.",
    group(ArgGroup::new("mode").required(true).args(["monitor", "analyze", "report"]))
)]
struct Cli {
    /// Run cycles on the configured interval until interrupted
    #[arg(long)]
    monitor: bool,

    /// Run a single cycle and print a summary
    #[arg(long)]
    analyze: bool,

    /// Run a single cycle and write the full snapshot as JSON
    #[arg(long)]
    report: bool,

    /// Report destination; stdout when omitted
    #[arg(short, long, value_name = "FILE", requires = "report")]
    output: Option<PathBuf>,

    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// JSON batch file read before every cycle
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
            if let Some(extension) = config_path.extension() {
                if extension != "toml" {
                    warn!(
                        "Configuration file does not have .toml extension: {}",
                        config_path.display()
                    );
                }
            }
        }

        if self.input.is_dir() {
            return Err(format!(
                "Input path is a directory: {}",
                self.input.display()
            ));
        }

        if let Some(ref output) = self.output {
            if output.is_dir() {
                return Err(format!(
                    "Output path is a directory: {}",
                    output.display()
                ));
            }
        }

        Ok(())
    }
}

/// Run one cycle and print the summary to stdout
fn analyze(engine: &RiskEngine, input: &Path) -> Result<()> {
    let mut source = JsonFileSource::new(input);
    let snapshot = run_once(engine, &mut source).context("Failed to read input batch")?;
    print!("{}", render_summary(&snapshot));
    Ok(())
}

/// Run one cycle and hand the snapshot to the report sink
fn report(engine: &RiskEngine, input: &Path, sink: &mut dyn ReportSink) -> Result<()> {
    let mut source = JsonFileSource::new(input);
    let snapshot = run_once(engine, &mut source).context("Failed to read input batch")?;
    sink.deliver(&Report::from_snapshot(&snapshot))
        .context("Failed to deliver report")?;
    Ok(())
}

/// Run the monitoring loop until Ctrl+C
fn monitor(engine: Arc<RiskEngine>, config: &Config, cli: &Cli) -> Result<()> {
    let interval = Duration::from_secs(config.monitoring.interval_seconds);
    let mut monitoring = MonitoringLoop::new(Arc::clone(&engine), interval);

    let watcher = cli.config.clone().map(ConfigWatcher::new);
    monitoring
        .start(Box::new(JsonFileSource::new(&cli.input)), watcher)
        .context("Failed to start monitoring loop")?;

    // Set up signal handling for graceful shutdown
    let (shutdown_sender, shutdown_receiver) = mpsc::channel();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("Error setting SIGINT handler for graceful shutdown")?;

    info!("Monitoring is running. Press Ctrl+C to stop.");
    if let Err(e) = shutdown_receiver.recv() {
        error!("Error waiting for shutdown: {}", e);
    }

    monitoring.stop().context("Error during shutdown")?;

    let snapshot = engine.snapshot();
    info!(
        "Monitoring stopped after cycle {} with {} current alerts",
        snapshot.cycle(),
        snapshot.summary().total
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let engine = match RiskEngine::from_config(&config) {
        Ok(engine) => Arc::new(engine),
        Err(ConfigError::ValidationError(problems)) => {
            for problem in &problems {
                error!("Invalid configuration: {}", problem);
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to initialize engine: {}", e);
            std::process::exit(1);
        }
    };

    let result = if cli.monitor {
        monitor(Arc::clone(&engine), &config, &cli)
    } else if cli.analyze {
        analyze(&engine, &cli.input)
    } else {
        let mut sink = JsonReportSink::new(cli.output.clone());
        report(&engine, &cli.input, &mut sink)
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
