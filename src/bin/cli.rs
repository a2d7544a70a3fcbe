//! flightmon CLI
//!
//! Scrapes the boards, prints reports, and serves the status endpoint.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum};
use flightmon::{
    context::MonitorContext,
    error::{AppError, Result},
    models::{Category, Config, FlightEntry, Summary},
    pipeline,
    services::{self, FileProducer, RowParser, SnapshotProducer},
    views::{self, csv, html, json, table},
};

/// flightmon - flight board roll-off monitor
#[derive(Parser, Debug)]
#[command(
    name = "flightmon",
    version,
    about = "Flags flights that never roll off the airport display"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape once: departures, then arrivals
    Scrape {
        /// Only scrape this category
        #[arg(long)]
        category: Option<Category>,

        /// Parse a saved page (or a directory of `<category>.html`) instead of fetching
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Scrape every `run_every_secs` until interrupted
    Watch {
        /// Parse a saved page (or a directory of `<category>.html`) instead of fetching
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Print today's flights and summary
    Print {
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Directory for CSV files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Run the status endpoint
    #[cfg(feature = "server")]
    Serve {
        /// Listen port (default: monitor.web_port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Dump every stored row of every category
    Inspect {
        #[arg(long)]
        category: Option<Category>,
    },

    /// Insert a synthetic stale flight to test alerting
    InjectStale {
        #[arg(long, default_value = "arrivals")]
        category: Category,

        /// Minutes since the fake status change
        #[arg(long, default_value_t = 120)]
        minutes: i64,

        #[arg(long, default_value = "Landed")]
        status: String,
    },

    /// Validate the configuration file
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Table,
    Csv,
    Html,
    Json,
}

/// Initialize logging with the given default filter.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn producer_for(config: &Config, from_file: Option<PathBuf>) -> Result<Box<dyn SnapshotProducer>> {
    match from_file {
        Some(path) => {
            log::info!("Reading boards from {}", path.display());
            Ok(Box::new(FileProducer::new(
                path,
                RowParser::new(&config.selectors)?,
            )))
        }
        None => services::build_producer(config),
    }
}

fn seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Sections with at least one flight; empty ones are reported and skipped.
fn with_data(
    sections: &[(Summary, Vec<FlightEntry>)],
) -> impl Iterator<Item = &(Summary, Vec<FlightEntry>)> {
    sections.iter().filter(|(summary, flights)| {
        if flights.is_empty() {
            log::warn!("No data found in the {} table for {}", summary.category, summary.day);
        }
        !flights.is_empty()
    })
}

async fn print_report(ctx: &MonitorContext, format: Format, out_dir: &Path) -> Result<()> {
    let now = ctx.clock().now();
    let sections = ctx.day_report().await?;

    match format {
        Format::Table => {
            for (summary, flights) in with_data(&sections) {
                println!("{}", table::render_summary(summary));
                println!("{}", table::render_history(flights, now));
            }
        }
        Format::Csv => {
            for (summary, flights) in with_data(&sections) {
                let path = csv::write_file(out_dir, summary.day, summary.category, flights)?;
                println!("CSV file created: {}", path.display());
            }
        }
        Format::Html => {
            for (summary, flights) in with_data(&sections) {
                println!("{}", html::render_category(summary, flights, now));
            }
        }
        Format::Json => {
            let summaries: Vec<Summary> = sections.into_iter().map(|(s, _)| s).collect();
            let document = json::summary_json(&summaries);
            json::write_summary_file(&ctx.config().monitor.summary_file, &document).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }
    Ok(())
}

fn validate(path: &Path, config: Config) -> Result<()> {
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    RowParser::new(&config.selectors)?;
    log::info!("✓ Config OK ({})", path.display());
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.monitor.log_level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    log::info!("flightmon starting...");

    let mut config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) if matches!(cli.command, Command::Validate) => {
            log::error!("Failed to load {}: {}", cli.config.display(), e);
            return Err(e);
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };
    config.apply_env_overrides();

    match cli.command {
        Command::Scrape {
            category,
            from_file,
        } => {
            let ctx = MonitorContext::open(config)?;
            let producer = producer_for(ctx.config(), from_file)?;
            let categories = match category {
                Some(category) => vec![category],
                None => Category::ALL.to_vec(),
            };
            for outcome in pipeline::run_scrape(&ctx, producer.as_ref(), &categories).await? {
                println!("{}", table::render_summary(&outcome.summary));
            }
        }

        Command::Watch { from_file } => {
            let ctx = MonitorContext::open(config)?;
            let producer = producer_for(ctx.config(), from_file)?;
            let ticks = pipeline::run_watch(&ctx, producer.as_ref(), shutdown_signal()).await?;
            log::info!("Watch finished after {} cycle(s)", ticks);
        }

        Command::Print { format, out_dir } => {
            let ctx = MonitorContext::open(config)?;
            print_report(&ctx, format, &out_dir).await?;
        }

        #[cfg(feature = "server")]
        Command::Serve { port } => {
            let port = port.unwrap_or(config.monitor.web_port);
            let ctx = MonitorContext::open(config)?;
            flightmon::server::serve(std::sync::Arc::new(ctx), port, shutdown_signal()).await?;
        }

        Command::Inspect { category } => {
            let ctx = MonitorContext::open(config)?;
            let categories = match category {
                Some(category) => vec![category],
                None => Category::ALL.to_vec(),
            };
            let headers: Vec<String> = views::COLUMNS.iter().map(|c| c.to_string()).collect();
            for category in categories {
                let flights = ctx.store().scan_all(category).await?;
                println!("Table: {} ({} rows)", category, flights.len());
                let rows: Vec<_> = flights.iter().map(views::raw_row).collect();
                println!("{}", table::render_grid(&headers, &rows));
            }
        }

        Command::InjectStale {
            category,
            minutes,
            status,
        } => {
            if minutes < 0 {
                return Err(AppError::validation("--minutes must not be negative"));
            }
            let ctx = MonitorContext::open(config)?;
            let id = pipeline::synthetic_flight_number(seed());
            let key = pipeline::inject_stale(&ctx, category, &id, &status, minutes).await?;
            println!("Injected {} into {}", key, category);
        }

        Command::Validate => validate(&cli.config, config)?,
    }

    log::info!("Done!");

    Ok(())
}
