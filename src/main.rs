//! gridcalc - Recompute formula cells of a grid snapshot in dependency order

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use gridcalc_core::storage::{load_csv, load_json, read_request, write_csv, write_json};
use gridcalc_core::{Document, validate_formula};
use log::{LevelFilter, info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use config::{Config, OutputFormat, load_config};

const EXIT_SUCCESS: u8 = 0;
/// The pass failed or the validated formula was rejected.
const EXIT_FAILED: u8 = 1;
/// Input could not be read or parsed, or output could not be written.
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "gridcalc")]
#[command(about = "Evaluate the formula cells of a grid in dependency order")]
#[command(version)]
struct Cli {
    /// JSON request `{data, columns}` or a .csv file; omit or `-` for stdin JSON
    input: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Attach dependency graph details to successful results
    #[arg(long)]
    dependency_info: bool,

    /// Validate a single formula instead of evaluating a grid
    #[arg(long, value_name = "FORMULA")]
    validate: Option<String>,

    /// Config file (default: <config dir>/gridcalc/config.toml)
    #[arg(long, value_name = "FILE", conflicts_with = "no_config")]
    config: Option<PathBuf>,

    /// Ignore any config file
    #[arg(long)]
    no_config: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Effective settings after merging flags over the config file.
struct Settings {
    format: OutputFormat,
    pretty: bool,
    dependency_info: bool,
}

impl Settings {
    fn resolve(cli: &Cli, config: &Config) -> Settings {
        Settings {
            format: cli.format.or(config.output.format).unwrap_or_default(),
            pretty: cli.pretty || config.output.pretty.unwrap_or(false),
            dependency_info: cli.dependency_info
                || config.evaluation.dependency_info.unwrap_or(false),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, warnings) = if cli.no_config {
        (Config::default(), Vec::new())
    } else {
        load_config(cli.config.as_deref())
    };
    init_logging(cli.verbose, config.log.level.as_deref());
    for warning in warnings {
        warn!("{}", warning);
    }

    match run(&cli, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_logging(verbose: bool, configured: Option<&str>) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    if let Some(level) = configured {
        builder.parse_filters(level);
    }
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None).init();
}

fn run(cli: &Cli, config: &Config) -> Result<u8> {
    let settings = Settings::resolve(cli, config);

    if let Some(formula) = cli.validate.as_deref() {
        let validation = validate_formula(formula);
        let mut out = open_output(cli.output.as_deref())?;
        write_json(&mut out, &validation, settings.pretty).context("Failed to write result")?;
        out.flush()?;
        return Ok(if validation.is_valid {
            EXIT_SUCCESS
        } else {
            EXIT_FAILED
        });
    }

    let mut doc = load_input(cli.input.as_deref())?;
    info!(
        "Loaded {} rows, {} columns, {} formulas",
        doc.rows.len(),
        doc.columns.len(),
        doc.formula_count()
    );

    let mut evaluation = doc.evaluate();
    if settings.dependency_info {
        evaluation = evaluation.with_dependency_info(doc.dependency_info());
    }

    let mut out = open_output(cli.output.as_deref())?;
    match settings.format {
        OutputFormat::Json => write_json(&mut out, &evaluation, settings.pretty),
        OutputFormat::Csv => write_csv(&mut out, &evaluation.data, &doc.columns),
    }
    .context("Failed to write result")?;
    out.flush()?;

    if let Some(path) = cli.output.as_ref() {
        info!("Wrote result to {}", path.display());
    }

    if evaluation.success {
        Ok(EXIT_SUCCESS)
    } else {
        if settings.format == OutputFormat::Csv
            && let Some(error) = evaluation.error.as_deref()
        {
            eprintln!("Error: {}", error);
        }
        Ok(EXIT_FAILED)
    }
}

fn load_input(input: Option<&Path>) -> Result<Document> {
    match input {
        None => read_request(io::stdin().lock()).context("Failed to read request from stdin"),
        Some(path) if path == Path::new("-") => {
            read_request(io::stdin().lock()).context("Failed to read request from stdin")
        }
        Some(path) if is_csv(path) => {
            load_csv(path).with_context(|| format!("Failed to load {}", path.display()))
        }
        Some(path) => load_json(path).with_context(|| format!("Failed to load {}", path.display())),
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}
