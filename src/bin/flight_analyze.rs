//! flight-analyze - command-line front end for the flight analytics core
//!
//! # Usage
//!
//! ```bash
//! # Segment one parameter, detect phases and anomalies
//! flight-analyze analyze --input flight.csv --model segment_forest.json
//!
//! # Pick a column and score anomalies against stored ones
//! flight-analyze analyze --input flight.csv --model forest.json \
//!     --parameter egt --history anomalies.json
//!
//! # Causality between the first two value columns
//! flight-analyze causality --input pair.csv
//!
//! # Granger relationship matrix over every value column
//! flight-analyze causality --input channels.csv --all-pairs
//! ```
//!
//! CSV input has a header row; the first column is time and every further
//! column is one channel. Results are printed to stdout as JSON, logs go to
//! stderr.
//!
//! # Environment Variables
//!
//! - `FLIGHT_ANALYTICS_CONFIG`: Path to the analysis TOML (when `--config` is absent)
//! - `RUST_LOG`: Logging level (default: info); add `--log-json` for JSON lines

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use flight_analytics::config::AnalysisConfig;
use flight_analytics::pipeline::{AnalysisContext, FlightSeriesCache, InMemorySource};
use flight_analytics::types::{HistoricalAnomalyRecord, TimeSeries};
use flight_analytics::{AutoCausalitySelector, FlightCausality};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "flight-analyze")]
#[command(about = "Flight sensor segmentation, anomaly and causality analysis")]
#[command(version)]
struct CliArgs {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Segment one flight parameter and report anomalies per phase
    Analyze {
        /// CSV file: time column followed by one or more value columns
        #[arg(long)]
        input: PathBuf,
        /// Segment classifier forest (JSON)
        #[arg(long)]
        model: PathBuf,
        /// Analysis config TOML (default: FLIGHT_ANALYTICS_CONFIG or ./flight_analytics.toml)
        #[arg(long, env = "FLIGHT_ANALYTICS_CONFIG")]
        config: Option<PathBuf>,
        /// Value column to analyse (default: first value column)
        #[arg(long)]
        parameter: Option<String>,
        /// Stored anomaly records (JSON array) to score against
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Causal analysis between channels
    Causality {
        /// CSV file: time column followed by at least two value columns
        #[arg(long)]
        input: PathBuf,
        /// Analysis config TOML
        #[arg(long, env = "FLIGHT_ANALYTICS_CONFIG")]
        config: Option<PathBuf>,
        /// Granger relationships for every pair of value columns instead of
        /// auto-selection on the first two
        #[arg(long)]
        all_pairs: bool,
    },
}

// ============================================================================
// CSV Input
// ============================================================================

/// Columns of a `time,value[,value...]` CSV file.
#[derive(Debug)]
struct CsvTable {
    names: Vec<String>,
    time: Vec<f64>,
    columns: Vec<Vec<f64>>,
}

impl CsvTable {
    fn series(&self, index: usize) -> Result<TimeSeries> {
        let values = self.columns[index].clone();
        TimeSeries::new(self.time.clone(), values)
            .with_context(|| format!("Column '{}' is not a valid series", self.names[index]))
    }
}

fn read_csv(path: &Path) -> Result<CsvTable> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
    let mut lines = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let header = match lines.next() {
        Some((_, header)) => header,
        None => bail!("CSV file is empty: {}", path.display()),
    };
    let names: Vec<String> = header
        .split(',')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect();
    if names.is_empty() {
        bail!("CSV header needs a time column and at least one value column");
    }

    let mut time = Vec::new();
    let mut columns = vec![Vec::new(); names.len()];
    for (line_num, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != names.len() + 1 {
            bail!(
                "Expected {} fields, got {} on line {}",
                names.len() + 1,
                fields.len(),
                line_num + 1
            );
        }
        time.push(parse_f64(fields[0], "time", line_num)?);
        for (column, (field, name)) in columns.iter_mut().zip(fields[1..].iter().zip(&names)) {
            column.push(parse_f64(field, name, line_num)?);
        }
    }

    info!(
        path = %path.display(),
        rows = time.len(),
        columns = names.len(),
        "Loaded CSV"
    );
    Ok(CsvTable {
        names,
        time,
        columns,
    })
}

fn parse_f64(field: &str, name: &str, line_num: usize) -> Result<f64> {
    field
        .parse::<f64>()
        .with_context(|| format!("Invalid {} value '{}' on line {}", name, field, line_num + 1))
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(AnalysisConfig::load()),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_analyze(
    input: &Path,
    model: &Path,
    config: Option<&Path>,
    parameter: Option<&str>,
    history: Option<&Path>,
) -> Result<()> {
    let table = read_csv(input)?;
    let index = match parameter {
        Some(name) => table
            .names
            .iter()
            .position(|n| n == name)
            .with_context(|| format!("No column named '{}' in {}", name, input.display()))?,
        None => 0,
    };
    let parameter = table.names[index].clone();
    let series = table.series(index)?;

    let context =
        AnalysisContext::load(config, model).context("Failed to load analysis context")?;

    let records: Vec<HistoricalAnomalyRecord> = match history {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read history: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse history: {}", path.display()))?
        }
        None => Vec::new(),
    };

    let flight_id = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flight".to_string());

    let mut source = InMemorySource::new();
    source.insert_series(&flight_id, &parameter, series);
    source.add_history(records);
    let cache = FlightSeriesCache::new(Arc::new(source));

    let analysis = context
        .analyzer()
        .analyze_flight(&cache, &flight_id, &parameter)
        .await
        .with_context(|| format!("Analysis of '{}' failed", parameter))?;

    if analysis.phases.fallback {
        warn!(flight_id = %flight_id, "Phase boundaries came from the fallback fractions");
    }
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn run_causality(input: &Path, config: Option<&Path>, all_pairs: bool) -> Result<()> {
    let table = read_csv(input)?;
    if table.names.len() < 2 {
        bail!(
            "Causality needs at least two value columns, found {}",
            table.names.len()
        );
    }
    let config = load_config(config)?;

    if all_pairs {
        let fields: Vec<(String, Vec<f64>)> = table
            .names
            .iter()
            .cloned()
            .zip(table.columns.iter().cloned())
            .collect();
        let matrix = FlightCausality::from_config(&config.causality).analyze_fields(&fields);
        println!("{}", serde_json::to_string_pretty(&matrix)?);
        return Ok(());
    }

    let (x_name, y_name) = (&table.names[0], &table.names[1]);
    let selection = AutoCausalitySelector::from_config(&config.causality)
        .select(&table.columns[0], &table.columns[1]);
    info!(
        x = %x_name,
        y = %y_name,
        method = %selection.method,
        pearson = selection.pearson,
        "Causality method selected"
    );
    println!("{}", serde_json::to_string_pretty(&selection)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match args.command {
        SubCommand::Analyze {
            input,
            model,
            config,
            parameter,
            history,
        } => {
            run_analyze(
                &input,
                &model,
                config.as_deref(),
                parameter.as_deref(),
                history.as_deref(),
            )
            .await
        }
        SubCommand::Causality {
            input,
            config,
            all_pairs,
        } => run_causality(&input, config.as_deref(), all_pairs),
    }
}
