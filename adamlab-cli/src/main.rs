//! AdamLab CLI: mirror projections from the command line.
//!
//! Commands:
//! - `project`: project one CSV file and write its artifact bundle
//! - `batch`: project every instrument in a watchlist and write a run log
//! - `fetch`: download daily bars from Yahoo Finance into the data directory
//!
//! Flags override the `--config` file, which overrides built-in defaults.
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use adamlab_core::{MissingClosePolicy, PivotMode, PivotSide, ShortHistoryPolicy};
use adamlab_runner::source::CachedSource;
use adamlab_runner::{
    load_watchlist, read_holidays, run_batch, run_instrument, BatchReport, CircuitBreaker,
    CsvSink, CsvSource, InstrumentRequest, InstrumentSummary, RunConfig, YahooSource,
};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adamlab", about = "AdamLab CLI: Adam Theory mirror projections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Pivot and projection overrides shared by `project`.
#[derive(Args)]
struct ProjectionArgs {
    /// Pivot on this date (nearest prior trading day). Overrides side selection.
    #[arg(long)]
    pivot_date: Option<NaiveDate>,

    /// Window of most recent rows searched for the pivot.
    #[arg(long)]
    lookback: Option<usize>,

    /// Number of business days to project.
    #[arg(long)]
    horizon: Option<usize>,

    /// Pivot on the lowest (`low`) or highest (`high`) close in the window.
    #[arg(long)]
    pivot_side: Option<PivotSide>,

    /// Holiday file: one YYYY-MM-DD per line.
    #[arg(long)]
    holidays: Option<PathBuf>,

    /// Fail instead of clamping when history before the pivot is too short.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Interpolate missing closes instead of dropping those rows.
    #[arg(long, default_value_t = false)]
    interpolate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Project one CSV price file.
    Project {
        /// Price CSV with a Date column and Close (or Adj Close).
        #[arg(long)]
        csv: PathBuf,

        /// Output name. Defaults to the CSV file stem.
        #[arg(long)]
        sheet_name: Option<String>,

        #[command(flatten)]
        projection: ProjectionArgs,

        #[arg(long, env = "ADAMLAB_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// TOML run configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Project every instrument in a watchlist CSV.
    Batch {
        #[arg(long)]
        watchlist: PathBuf,

        /// Directory holding `<ticker>.csv` files.
        #[arg(long, env = "ADAMLAB_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Re-download missing or stale data files from Yahoo Finance.
        /// `ADAMLAB_AUTO_FETCH` accepts 1/0, yes/no, on/off and true/false.
        #[arg(
            long,
            env = "ADAMLAB_AUTO_FETCH",
            action = ArgAction::SetTrue,
            value_parser = BoolishValueParser::new()
        )]
        auto_fetch: bool,

        /// Age in days after which a data file is re-downloaded.
        #[arg(long, env = "ADAMLAB_REFRESH_DAYS")]
        refresh_days: Option<u64>,

        /// Days of history to request when fetching.
        #[arg(long, env = "ADAMLAB_FETCH_DAYS")]
        fetch_days: Option<u32>,

        /// Holiday file: one YYYY-MM-DD per line.
        #[arg(long)]
        holidays: Option<PathBuf>,

        #[arg(long, env = "ADAMLAB_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// TOML run configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Download daily bars into `<data_dir>/<ticker>.csv`.
    Fetch {
        ticker: String,

        /// Market suffix to force (e.g. `.TW`). Without it each configured market is tried.
        #[arg(long)]
        market: Option<String>,

        /// Days of history to request.
        #[arg(long, env = "ADAMLAB_FETCH_DAYS")]
        days: Option<u32>,

        #[arg(long, env = "ADAMLAB_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// TOML run configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Project {
            csv,
            sheet_name,
            projection,
            output_dir,
            config,
        } => run_project(csv, sheet_name, projection, output_dir, config),
        Commands::Batch {
            watchlist,
            data_dir,
            auto_fetch,
            refresh_days,
            fetch_days,
            holidays,
            output_dir,
            config,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(dir) = data_dir {
                cfg.data.data_dir = dir;
            }
            if auto_fetch {
                cfg.data.auto_fetch = true;
            }
            if let Some(days) = refresh_days {
                cfg.data.refresh_days = days;
            }
            if let Some(days) = fetch_days {
                cfg.data.fetch_days = days;
            }
            if let Some(dir) = output_dir {
                cfg.output.output_dir = dir;
            }
            add_holidays(&mut cfg, holidays.as_deref())?;
            run_batch_cmd(&watchlist, cfg)
        }
        Commands::Fetch {
            ticker,
            market,
            days,
            data_dir,
            config,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(days) = days {
                cfg.data.fetch_days = days;
            }
            if let Some(dir) = data_dir {
                cfg.data.data_dir = dir;
            }
            run_fetch(&ticker, market, cfg)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(p) => RunConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(RunConfig::default()),
    }
}

fn add_holidays(cfg: &mut RunConfig, path: Option<&Path>) -> Result<()> {
    if let Some(p) = path {
        let days = read_holidays(p)?;
        println!("Loaded {} holidays from {}", days.len(), p.display());
        cfg.calendar.holidays.extend(days);
    }
    Ok(())
}

fn apply_projection_args(cfg: &mut RunConfig, args: &ProjectionArgs) {
    let projection = &mut cfg.projection;
    if let Some(h) = args.horizon {
        projection.horizon = h;
    }
    if args.strict {
        projection.short_history = ShortHistoryPolicy::Fail;
    }
    if args.interpolate {
        projection.missing_close = MissingClosePolicy::Interpolate;
    }
    if let Some(date) = args.pivot_date {
        projection.pivot = PivotMode::ExplicitDate { date };
    } else if args.pivot_side.is_some() || args.lookback.is_some() {
        let (side, lookback) = match projection.pivot {
            PivotMode::Side { side, lookback } => (side, lookback),
            PivotMode::ExplicitDate { .. } => (PivotSide::Min, 10),
        };
        projection.pivot = PivotMode::Side {
            side: args.pivot_side.unwrap_or(side),
            lookback: args.lookback.unwrap_or(lookback),
        };
    }
}

fn run_project(
    csv: PathBuf,
    sheet_name: Option<String>,
    args: ProjectionArgs,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut cfg = load_config(config.as_deref())?;
    apply_projection_args(&mut cfg, &args);
    add_holidays(&mut cfg, args.holidays.as_deref())?;
    if let Some(dir) = output_dir {
        cfg.output.output_dir = dir;
    }
    cfg.validate()?;
    tracing::debug!(config = ?cfg, "resolved config");

    let stem = csv
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".into());
    let request = InstrumentRequest::new(stem.clone(), cfg.projection)
        .with_sheet_name(sheet_name.unwrap_or(stem));

    let source = CsvSource::new(&csv);
    let sink = CsvSink::new(&cfg.output.output_dir);
    let calendar = cfg.business_calendar();
    let run_ts = chrono::Local::now().naive_local();

    let summary = run_instrument(&request, &source, &sink, &calendar, run_ts)?;
    print_summary(&summary);
    println!("Artifacts saved to: {}", summary.artifacts.dir.display());
    Ok(())
}

fn run_batch_cmd(watchlist: &Path, cfg: RunConfig) -> Result<()> {
    cfg.validate()?;
    tracing::debug!(config = ?cfg, "resolved config");
    let entries = load_watchlist(watchlist)?;
    if entries.is_empty() {
        bail!("watchlist {} has no tickers", watchlist.display());
    }

    let fetcher = if cfg.data.auto_fetch {
        let breaker = Arc::new(CircuitBreaker::for_provider());
        Some(Arc::new(YahooSource::new(
            breaker,
            cfg.data.fetch_days,
            cfg.data.markets.clone(),
        )?))
    } else {
        None
    };

    let sink = CsvSink::new(&cfg.output.output_dir);
    let calendar = cfg.business_calendar();
    let run_ts = chrono::Local::now().naive_local();

    let report = run_batch(&entries, &cfg, fetcher, &sink, &calendar, run_ts);
    print_batch(&report);
    let log = report.write_run_log(&cfg.output.output_dir)?;
    println!("Run log: {}", log.display());

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_fetch(ticker: &str, market: Option<String>, cfg: RunConfig) -> Result<()> {
    cfg.validate()?;
    let breaker = Arc::new(CircuitBreaker::for_provider());
    let yahoo = YahooSource::new(breaker, cfg.data.fetch_days, cfg.data.markets.clone())?;
    let cache = CachedSource::new(&cfg.data.data_dir, cfg.data.refresh_days).with_market(market);

    let path = cache
        .refresh(&yahoo, ticker)
        .with_context(|| format!("failed to fetch {ticker}"))?;
    println!("Saved {ticker} to {}", path.display());
    Ok(())
}

fn print_summary(s: &InstrumentSummary) {
    println!();
    println!("=== {} ({}) ===", s.sheet_name, s.ticker);
    println!("Pivot:        {} @ {}", s.pivot.date, s.pivot.close);
    println!("Rows:         {}", s.rows);
    println!("Dataset hash: {}", s.dataset_hash.short());
    for w in &s.warnings {
        println!("Warning:      {w}");
    }
}

fn print_batch(report: &BatchReport) {
    println!();
    println!(
        "{:<12} {:<20} {:<7} {:>6} {:<12} Detail",
        "Ticker", "Sheet", "Status", "Rows", "Pivot"
    );
    println!("{}", "-".repeat(72));
    for o in &report.outcomes {
        match &o.result {
            Ok(s) => println!(
                "{:<12} {:<20} {:<7} {:>6} {:<12} {}",
                o.ticker,
                o.sheet_name,
                "ok",
                s.rows,
                s.pivot.date,
                s.warnings.join("; ")
            ),
            Err(e) => println!(
                "{:<12} {:<20} {:<7} {:>6} {:<12} {e}",
                o.ticker, o.sheet_name, "failed", "", ""
            ),
        }
    }
    println!();
    println!(
        "{} succeeded, {} failed, {} total",
        report.succeeded(),
        report.failed(),
        report.outcomes.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ProjectionArgs {
        ProjectionArgs {
            pivot_date: None,
            lookback: None,
            horizon: None,
            pivot_side: None,
            holidays: None,
            strict: false,
            interpolate: false,
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let mut cfg = RunConfig::from_toml("[projection]\nhorizon = 5\n").unwrap();
        apply_projection_args(
            &mut cfg,
            &ProjectionArgs {
                lookback: Some(20),
                pivot_side: Some(PivotSide::Max),
                strict: true,
                ..args()
            },
        );
        assert_eq!(cfg.projection.horizon, 5);
        assert_eq!(cfg.projection.short_history, ShortHistoryPolicy::Fail);
        assert_eq!(
            cfg.projection.pivot,
            PivotMode::Side {
                side: PivotSide::Max,
                lookback: 20
            }
        );
    }

    #[test]
    fn pivot_date_flag_wins() {
        let mut cfg = RunConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        apply_projection_args(
            &mut cfg,
            &ProjectionArgs {
                pivot_date: Some(date),
                pivot_side: Some(PivotSide::Max),
                ..args()
            },
        );
        assert_eq!(cfg.projection.pivot, PivotMode::ExplicitDate { date });
    }

    #[test]
    fn parses_project_command() {
        let cli = Cli::try_parse_from([
            "adamlab",
            "project",
            "--csv",
            "x.csv",
            "--pivot-side",
            "high",
            "--horizon",
            "12",
        ])
        .unwrap();
        match cli.command {
            Commands::Project { csv, projection, .. } => {
                assert_eq!(csv, PathBuf::from("x.csv"));
                assert_eq!(projection.pivot_side, Some(PivotSide::Max));
                assert_eq!(projection.horizon, Some(12));
            }
            _ => panic!("expected project"),
        }
    }

    fn batch_auto_fetch() -> bool {
        let cli = Cli::try_parse_from(["adamlab", "batch", "--watchlist", "w.csv"]).unwrap();
        match cli.command {
            Commands::Batch { auto_fetch, .. } => auto_fetch,
            _ => panic!("expected batch"),
        }
    }

    // Only this test touches ADAMLAB_AUTO_FETCH.
    #[test]
    fn auto_fetch_env_accepts_numeric_flags() {
        for (value, want) in [("1", true), ("true", true), ("yes", true), ("0", false), ("off", false)] {
            std::env::set_var("ADAMLAB_AUTO_FETCH", value);
            assert_eq!(batch_auto_fetch(), want, "ADAMLAB_AUTO_FETCH={value}");
        }
        std::env::remove_var("ADAMLAB_AUTO_FETCH");
        assert!(!batch_auto_fetch());
    }

    #[test]
    fn default_calendar_is_weekdays() {
        use adamlab_core::{BusinessCalendar, WeekdayCalendar};
        let cfg = RunConfig::default();
        let fri = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            cfg.business_calendar().next_business_day(fri),
            WeekdayCalendar.next_business_day(fri)
        );
    }
}
