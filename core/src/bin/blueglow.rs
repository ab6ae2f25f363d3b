// core/src/bin/blueglow.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::info;

use blueglow_core::config::BlueGlowConfig;
use blueglow_core::fetch::UreqTransport;
use blueglow_core::forecast::today_utc;
use blueglow_core::types::parse_date;
use blueglow_core::{metrics, pipeline, Climatology};

#[derive(Debug, Parser)]
#[command(name = "blueglow", about = "BlueGlow bioluminescence forecast pipeline")]
struct Args {
    /// TOML config (missing file => defaults).
    #[arg(long, short, default_value = "blueglow.toml")]
    config: PathBuf,

    /// Start date YYYY-MM-DD (default: today, UTC).
    #[arg(long, global = true)]
    start: Option<String>,

    /// Print Prometheus counters when done.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sun/moon/tide snapshot for the next days.
    Astronomy,
    /// Download SST, Chl-a and NDBC buoy history.
    Fetch,
    /// Build the day-of-year climatology from raw buoy files.
    Climatology,
    /// Train the weak-supervision model.
    Train,
    /// Best-week forecast.
    Forecast {
        /// Timeslots per day instead of one score per day.
        #[arg(long)]
        detailed: bool,
    },
    /// Plain forecast for the next days, no window search.
    Next7,
    /// Detailed forecast for a long run of consecutive days.
    Year {
        /// Number of days (default: forecast.year_days).
        #[arg(long)]
        days: Option<usize>,
    },
    /// Detailed forecasts keyed by date for offline lookup.
    Database {
        /// Number of 365-day years (default: forecast.database_years).
        #[arg(long)]
        years: Option<usize>,
    },
    /// Climatology + model (if missing) and both forecasts.
    Run,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = BlueGlowConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let start = match &args.start {
        Some(s) => parse_date(s).context("--start")?,
        None => today_utc(),
    };

    match args.command {
        Command::Astronomy => {
            pipeline::run_astronomy(&cfg, start).context("astronomy stage")?;
        }
        Command::Fetch => {
            let http = UreqTransport::new(Duration::from_secs(cfg.fetch.timeout_secs));
            let report = pipeline::run_fetch(&cfg, &http, today_utc()).context("fetch stage")?;
            println!(
                "downloaded={} skipped_existing={} failed={}",
                report.downloaded, report.skipped_existing, report.failed
            );
        }
        Command::Climatology => {
            pipeline::run_climatology(&cfg).context("climatology stage")?;
        }
        Command::Train => {
            let clim = Climatology::load(&cfg.paths.climatology).context("train stage")?;
            let model = pipeline::run_train(&cfg, &clim).context("train stage")?;
            if let Some(auc) = model.metadata.evaluation.roc_auc {
                println!("roc_auc={auc:.3}");
            }
        }
        Command::Forecast { detailed } => {
            pipeline::run_forecast(&cfg, start, detailed).context("forecast stage")?;
        }
        Command::Next7 => {
            pipeline::run_next_days(&cfg, start).context("next7 stage")?;
        }
        Command::Year { days } => {
            let n = days.unwrap_or(cfg.forecast.year_days);
            let doc = pipeline::run_year(&cfg, start, n).context("year stage")?;
            info!("📅 {} dager skrevet", doc.forecasts.len());
        }
        Command::Database { years } => {
            let years = years.unwrap_or(cfg.forecast.database_years);
            let db = pipeline::run_database(&cfg, start, years).context("database stage")?;
            info!("🗄️ {} datoer skrevet", db.forecasts.len());
        }
        Command::Run => {
            let summary = pipeline::run_all(&cfg, start).context("run")?;
            info!(
                "🌊 Ferdig: {} daglige og {} detaljerte dager skrevet",
                summary.daily.forecasts.len(),
                summary.detailed.forecasts.len()
            );
        }
    }

    if args.metrics {
        print!("{}", metrics::render());
    }
    Ok(())
}
