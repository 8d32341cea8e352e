//! PLUTO run inspector.
//!
//! Reads a run directory's `definitions.h` and step log (or a YAML run
//! configuration) and reports the run configuration, the logged outputs,
//! the field catalog and unit conversions.

mod report;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use pluto_data::{RunConfig, StepLog, StepSelector};

use report::Format;

#[derive(Parser, Debug)]
#[command(name = "pluto-info")]
#[command(about = "Inspect PLUTO simulation output directories")]
struct Args {
    /// Run directory
    #[arg(short, long, default_value = ".", env = "PLUTO_RUN_DIR")]
    run_dir: PathBuf,

    /// Output datatype (names the step log, e.g. vtk.out)
    #[arg(short, long, default_value = "vtk")]
    datatype: String,

    /// YAML run configuration, used instead of definitions.h
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the run configuration
    Info,
    /// List the logged outputs
    Steps,
    /// List known fields and whether this run saves or derives them
    Fields,
    /// Find the output for a step number or a simulation time
    Resolve {
        /// Output number; negative selects the last output
        #[arg(long, allow_hyphen_values = true, conflicts_with = "time")]
        step: Option<i64>,
        /// Simulation time; selects the nearest output
        #[arg(long, allow_hyphen_values = true)]
        time: Option<f64>,
    },
    /// Evaluate a unit expression in this run's unit system
    Units {
        /// Expression, e.g. "code_density*code_velocity**2"
        expression: String,
        /// Convert into this unit
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Format::Text,
            OutputFormat::Json => Format::Json,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = match &args.config {
        Some(path) => {
            let mut config = RunConfig::from_yaml_file(path)
                .with_context(|| format!("reading run configuration {}", path.display()))?;
            if config.run_dir.is_none() {
                config.run_dir = Some(args.run_dir.clone());
            }
            config
        }
        None => RunConfig::from_run_dir(&args.run_dir, &args.datatype)
            .with_context(|| format!("reading run directory {}", args.run_dir.display()))?,
    };
    config.apply_env_overrides();
    let config = config.validated()?;
    debug!(?config, "effective configuration");

    let format = Format::from(args.format);
    let output = match &args.command {
        Command::Info => report::info(&config, format)?,
        Command::Steps => report::steps(&load_log(&config)?, format)?,
        Command::Fields => report::fields(&config, format)?,
        Command::Resolve { step, time } => {
            let selector = match (step, time) {
                (Some(step), None) => StepSelector::Step(*step),
                (None, Some(time)) => StepSelector::Time(*time),
                _ => bail!("give exactly one of --step or --time"),
            };
            report::resolve(&load_log(&config)?, selector, format)?
        }
        Command::Units { expression, to } => report::units(&config, expression, to.as_deref(), format)?,
    };
    println!("{}", output);
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_log(config: &RunConfig) -> Result<StepLog> {
    let dir = config
        .run_dir
        .as_deref()
        .context("run directory is not set")?;
    let path = config.step_log_path(dir);
    StepLog::from_file(&path).with_context(|| format!("reading step log {}", path.display()))
}
