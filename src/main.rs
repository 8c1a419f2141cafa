//! Chronicle Query CLI
//!
//! Command-line interface for the query layer:
//! - Compile queries and inspect the result
//! - Run queries or dashboard requests against a JSON data file
//! - List registered stages
//! - Inspect archive files

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use chronicle_query::archive::FileArchiver;
use chronicle_query::config::{generate_default_config, Config, ConfigOrigin, LoggingConfig};
use chronicle_query::filter::extract_targets;
use chronicle_query::query::{compile_query, write_csv, QueryExecutor, QueryOutput, TargetSeries};
use chronicle_query::stage::StageKind;
use chronicle_query::storage::{MemoryStore, TimeRange};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chronicle-query")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run time-series queries")]
#[command(long_about = "Compiles measurement.field[.filter][=>stage,args] queries and runs them\nagainst series loaded from a JSON data file.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a query and print the target as JSON
    Compile {
        /// Query string
        query: String,
    },

    /// Run a query against a data file
    Run {
        /// Query string
        query: String,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run a dashboard request body ({"targets": [...]}) against a data file
    Targets {
        /// Path to the request JSON
        request: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List registered stages
    Functions,

    /// List the records of an archive file
    ArchiveDump {
        /// Archive file (default: configured archive)
        path: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct SourceArgs {
    /// JSON data file with series records
    #[arg(short, long)]
    data: PathBuf,
    /// Database name (default: from config)
    #[arg(long)]
    db: Option<String>,
    /// Range start, Unix milliseconds
    #[arg(long, requires = "end")]
    start: Option<i64>,
    /// Range end, Unix milliseconds (exclusive)
    #[arg(long, requires = "start")]
    end: Option<i64>,
    /// Relative range ending now (e.g., 12h, 7d, 4w)
    #[arg(short, long, conflicts_with = "start")]
    last: Option<String>,
    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
    /// Use the materialized pipeline for every chain
    #[arg(long)]
    force_materialized: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, origin) = match &cli.config {
        Some(path) => {
            let config = Config::load_with_env(path)?;
            let origin = ConfigOrigin {
                path: Some(path.clone()),
                ..ConfigOrigin::default()
            };
            (config, origin)
        }
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    for error in &origin.skipped {
        tracing::warn!("Skipped config file: {}", error);
    }
    match &origin.path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    match cli.command {
        Commands::Compile { query } => {
            let target = compile_query(&query)?;
            println!("{}", serde_json::to_string_pretty(&target)?);
        }

        Commands::Run { query, source } => {
            let target = compile_query(&query)?;
            let range = resolve_range(&source, target.lookback.as_deref())?;
            let executor = executor(&source, &config)?;
            let db = source.db.as_deref().unwrap_or(&config.query.default_db);

            tracing::info!(query = %query, db, range = %range, "Running query");
            let output = executor.execute(db, &target, range)?;
            print_output(&output, source.format)?;
        }

        Commands::Targets { request, source } => {
            let body = std::fs::read_to_string(&request)
                .with_context(|| format!("Failed to read {:?}", request))?;
            let targets: Vec<TargetSeries> = extract_targets(&body)?;
            let range = resolve_range(&source, None)?;
            let executor = executor(&source, &config)?;
            let db = source.db.as_deref().unwrap_or(&config.query.default_db);

            tracing::info!(targets = targets.len(), db, range = %range, "Running dashboard request");
            let output = executor.execute_all(db, &targets, range)?;
            print_output(&output, source.format)?;
        }

        Commands::Functions => {
            println!("{:<28} {:<6} {:<13} DESCRIPTION", "NAMES", "ARGS", "MODE");
            for kind in StageKind::all() {
                let mode = if kind.supports_streaming() {
                    "streaming"
                } else {
                    "materialized"
                };
                println!(
                    "{:<28} {:<6} {:<13} {}",
                    kind.names().join(", "),
                    kind.arity(),
                    mode,
                    kind.description()
                );
            }
        }

        Commands::ArchiveDump { path } => {
            let path = path.unwrap_or_else(|| config.archive.dir.join(&config.archive.file_name));
            let records = FileArchiver::read_all(&path)
                .with_context(|| format!("Failed to read archive {:?}", path))?;

            for record in &records {
                println!(
                    "{}\t{}\t{}\tbucket={}\t{} bytes",
                    record.db,
                    record.measurement,
                    record.series_key,
                    record.bucket_id,
                    record.payload.len()
                );
            }
            tracing::info!(records = records.len(), "Read archive {:?}", path);
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chronicle_query={}", config.level)));

    let writer = match &config.file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init();
    }

    Ok(())
}

fn executor(source: &SourceArgs, config: &Config) -> anyhow::Result<QueryExecutor<MemoryStore>> {
    let store = load_store(&source.data)?;
    Ok(QueryExecutor::new(Arc::new(store))
        .force_materialized(source.force_materialized || config.query.force_materialized))
}

fn load_store(path: &Path) -> anyhow::Result<MemoryStore> {
    let store =
        MemoryStore::load(path).with_context(|| format!("Failed to load data file {:?}", path))?;
    tracing::info!(series = store.series_count(), "Loaded {:?}", path);
    Ok(store)
}

/// Explicit bounds, then `--last`, then the query's lookback prefix
fn resolve_range(source: &SourceArgs, lookback: Option<&str>) -> anyhow::Result<TimeRange> {
    if let (Some(start), Some(end)) = (source.start, source.end) {
        return TimeRange::try_new(start, end)
            .with_context(|| format!("Invalid time range: start {} must be before end {}", start, end));
    }

    let relative = source
        .last
        .as_deref()
        .or_else(|| lookback.map(|l| l.trim_end_matches('=').trim_end_matches('<')));

    match relative {
        Some(text) => {
            let duration = parse_duration(text)?;
            let end = Utc::now().timestamp_millis();
            end.checked_sub(duration.num_milliseconds())
                .and_then(|start| TimeRange::try_new(start, end))
                .with_context(|| format!("Invalid duration: {}", text))
        }
        None => Ok(TimeRange::all()),
    }
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim().to_lowercase();

    let duration = if let Some(hours) = s.strip_suffix('h') {
        Duration::try_hours(hours.parse()?)
    } else if let Some(days) = s.strip_suffix('d') {
        Duration::try_days(days.parse()?)
    } else if let Some(weeks) = s.strip_suffix('w') {
        Duration::try_weeks(weeks.parse()?)
    } else if let Some(months) = s.strip_suffix('m') {
        months.parse::<i64>()?.checked_mul(30).and_then(Duration::try_days)
    } else if let Some(years) = s.strip_suffix('y') {
        years.parse::<i64>()?.checked_mul(365).and_then(Duration::try_days)
    } else {
        bail!("Invalid duration format: {}. Use: 12h, 7d, 4w, 3m, 1y", s)
    };

    match duration {
        Some(duration) => Ok(duration),
        None => bail!("Duration out of range: {}", s),
    }
}

fn print_output(output: &QueryOutput, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output.series)?),
        OutputFormat::Csv => write_csv(&output.series, std::io::stdout().lock())?,
    }
    tracing::info!(
        series = output.len(),
        points_scanned = output.points_scanned,
        "Query completed in {}ms",
        output.execution_time_ms
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_duration("7D").unwrap(), Duration::days(7));
        assert_eq!(parse_duration("4w").unwrap(), Duration::weeks(4));
        assert_eq!(parse_duration("3m").unwrap(), Duration::days(90));
        assert_eq!(parse_duration("1y").unwrap(), Duration::days(365));
        assert!(parse_duration("7").is_err());
        assert!(parse_duration("xh").is_err());
    }

    #[test]
    fn test_parse_duration_out_of_range() {
        for text in [
            "9223372036854775807h",
            "9223372036854775807d",
            "99999999999999999w",
            "9223372036854775807m",
            "9223372036854775807y",
        ] {
            assert!(parse_duration(text).is_err(), "{text}");
        }
    }
}
