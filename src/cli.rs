//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_result_adapter::{CsvResultAdapter, write_csv};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::config_validation::validate_config;
use crate::domain::error::PerptraderError;
use crate::domain::funding::FundingConfig;
use crate::domain::gaps::{DEFAULT_GAP_TOLERANCE, find_gaps, summarize_gaps};
use crate::domain::indicator::IndicatorConfig;
use crate::domain::metrics::BacktestResult;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::result_port::ResultPort;

pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Parser, Debug)]
#[command(name = "perptrader", about = "Perpetual futures signal backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write its results
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Bar CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Directory for the CSV results
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// SQLite database, overrides [sqlite] path
        #[arg(long)]
        sqlite: Option<PathBuf>,
    },
    /// Compute indicators and entry signals without trading
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Report open/close gaps between consecutive bars
    Gaps {
        #[arg(short, long)]
        data: PathBuf,
        /// Relative open/close tolerance, overrides [data] gap_tolerance
        #[arg(short, long)]
        tolerance: Option<f64>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            sqlite,
        } => run_backtest(&config, data.as_ref(), output.as_ref(), sqlite.as_ref()),
        Command::Signals {
            config,
            data,
            output,
        } => run_signals(&config, data.as_ref(), &output),
        Command::Gaps {
            data,
            tolerance,
            config,
        } => run_gaps(&data, tolerance, config.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Installs the stderr `tracing` subscriber, filtered by `RUST_LOG`
/// (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report(err: &PerptraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| report(&e))
}

fn get_count(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

pub fn build_indicator_config(config: &dyn ConfigPort) -> IndicatorConfig {
    let d = IndicatorConfig::default();
    IndicatorConfig {
        rsi_fast_length: get_count(config, "indicators", "rsi_fast_length", d.rsi_fast_length),
        rsi_slow_length: get_count(config, "indicators", "rsi_slow_length", d.rsi_slow_length),
        bollinger_length: get_count(config, "indicators", "bollinger_length", d.bollinger_length),
        bollinger_factor: config.get_double("indicators", "bollinger_factor", d.bollinger_factor),
        envelope_length: get_count(config, "indicators", "envelope_length", d.envelope_length),
        envelope_percent: config.get_double("indicators", "envelope_percent", d.envelope_percent),
        sma_length: get_count(config, "indicators", "sma_length", d.sma_length),
    }
}

/// Validates the config, then reads every run parameter with its default.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, PerptraderError> {
    validate_config(config)?;

    let d = BacktestConfig::default();
    let funding_defaults = FundingConfig::default();
    let interval_hours = config.get_int(
        "funding",
        "interval_hours",
        i64::from(funding_defaults.interval_hours),
    );

    Ok(BacktestConfig {
        indicators: build_indicator_config(config),
        starting_balance: config.get_double("backtest", "starting_balance", d.starting_balance),
        position_size_fraction: config.get_double(
            "backtest",
            "position_size_fraction",
            d.position_size_fraction,
        ),
        cooldown_bars: get_count(config, "backtest", "cooldown_bars", d.cooldown_bars),
        funding: FundingConfig {
            rate: config.get_double("funding", "rate", funding_defaults.rate),
            interval_hours: u32::try_from(interval_hours).unwrap_or(funding_defaults.interval_hours),
        },
        periods_per_year: config.get_double("backtest", "periods_per_year", d.periods_per_year),
    })
}

/// `--data` wins over `[data] path`.
pub fn resolve_data_path(data_override: Option<&PathBuf>, config: &dyn ConfigPort) -> Option<PathBuf> {
    data_override
        .cloned()
        .or_else(|| config.get_string("data", "path").map(PathBuf::from))
        .filter(|p| !p.as_os_str().is_empty())
}

/// `--sqlite` wins over `[sqlite] path`.
pub fn resolve_sqlite_path(sqlite_override: Option<&PathBuf>, config: &dyn ConfigPort) -> Option<String> {
    sqlite_override
        .map(|p| p.display().to_string())
        .or_else(|| config.get_string("sqlite", "path"))
        .filter(|p| !p.trim().is_empty())
}

fn missing_data_path() -> PerptraderError {
    PerptraderError::ConfigMissing {
        section: "data".into(),
        key: "path".into(),
    }
}

fn run_backtest(
    config_path: &Path,
    data_override: Option<&PathBuf>,
    output_dir: Option<&PathBuf>,
    sqlite_override: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate and build BacktestConfig
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return report(&e),
    };

    // Stage 3: Output targets
    let output_dir = output_dir
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let csv_results = match CsvResultAdapter::new(output_dir) {
        Ok(a) => a,
        Err(e) => return report(&e),
    };

    let data_path = resolve_data_path(data_override, &adapter);
    let sqlite_path = resolve_sqlite_path(sqlite_override, &adapter);

    // Stages 4-6: Data port dependent pipeline
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        if let Some(db_path) = sqlite_path {
            let pool_size = adapter.get_int("sqlite", "pool_size", 4).max(1) as u32;
            let store = match SqliteAdapter::open(&db_path, pool_size)
                .and_then(|s| s.initialize_schema().map(|()| s))
            {
                Ok(s) => s,
                Err(e) => return report(&e),
            };

            // CSV input is loaded into the store, which then serves the replay.
            if let Some(path) = data_path {
                eprintln!("Loading candles from {} into {}", path.display(), db_path);
                let loaded = CsvAdapter::new(path)
                    .fetch_bars(None, None)
                    .and_then(|bars| store.upsert_bars(&bars));
                if let Err(e) = loaded {
                    return report(&e);
                }
            }

            return run_backtest_pipeline(&store, &[&csv_results, &store], &bt_config);
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        if sqlite_path.is_some() {
            eprintln!("error: sqlite feature is required for a [sqlite] store");
            return ExitCode::from(1);
        }
    }

    let Some(data_path) = data_path else {
        return report(&missing_data_path());
    };
    run_backtest_pipeline(&CsvAdapter::new(data_path), &[&csv_results], &bt_config)
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    result_ports: &[&dyn ResultPort],
    bt_config: &BacktestConfig,
) -> ExitCode {
    // Stage 4: Fetch bars
    match data_port.get_data_range() {
        Ok(Some((first, last, count))) => {
            eprintln!("Data available: {count} bars, {first} to {last}")
        }
        Ok(None) => eprintln!("Data source is empty"),
        Err(e) => return report(&e),
    }
    let bars = match data_port.fetch_bars(None, None) {
        Ok(bars) => bars,
        Err(e) => return report(&e),
    };

    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        eprintln!(
            "Running backtest: {} bars, {} to {}",
            bars.len(),
            first.timestamp,
            last.timestamp
        );
    }

    // Stage 5: Replay
    let output = match backtest_engine::run_backtest(&bars, bt_config) {
        Ok(o) => o,
        Err(e) => return report(&e),
    };

    print_summary(&output.result);

    // Stage 6: Persist
    for port in result_ports {
        if let Err(e) = port.write_output(&output) {
            return report(&e);
        }
    }
    eprintln!(
        "\n{} orders, {} equity points, {} signal rows written",
        output.orders.len(),
        output.equity_curve.len(),
        output.signals.len()
    );
    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Start Balance:    {:.2}", result.start_balance);
    eprintln!("End Balance:      {:.2}", result.end_balance);
    eprintln!("Total Return:     {:.2}%", result.total_return);
    eprintln!(
        "Total Trades:     {} ({} long / {} short)",
        result.total_trades, result.long_trades, result.short_trades
    );
    eprintln!(
        "Win Rate:         {:.1}% ({} won / {} lost)",
        result.win_rate, result.winning_trades, result.losing_trades
    );
    eprintln!("Max Drawdown:     -{:.2}%", result.max_drawdown);
    match result.sharpe {
        Some(sharpe) => eprintln!("Sharpe Ratio:     {:.2}", sharpe),
        None => eprintln!("Sharpe Ratio:     n/a"),
    }
    eprintln!("Funding Paid:     {:.4}", result.funding_paid_total);
}

fn run_signals(config_path: &Path, data_override: Option<&PathBuf>, output: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        return report(&e);
    }
    let indicators = build_indicator_config(&adapter);

    let Some(data_path) = resolve_data_path(data_override, &adapter) else {
        return report(&missing_data_path());
    };

    let records = CsvAdapter::new(data_path)
        .fetch_bars(None, None)
        .and_then(|bars| backtest_engine::compute_signal_records(&bars, &indicators));
    let records = match records {
        Ok(r) => r,
        Err(e) => return report(&e),
    };

    if let Err(e) = write_csv(output, &records) {
        return report(&e);
    }

    let emitted = records.iter().filter(|r| r.signal.is_some()).count();
    eprintln!(
        "{} rows, {} signals written to {}",
        records.len(),
        emitted,
        output.display()
    );
    ExitCode::SUCCESS
}

fn run_gaps(data_path: &Path, tolerance: Option<f64>, config_path: Option<&Path>) -> ExitCode {
    let configured = match config_path.map(load_config).transpose() {
        Ok(adapter) => adapter
            .map(|a| a.get_double("data", "gap_tolerance", DEFAULT_GAP_TOLERANCE))
            .unwrap_or(DEFAULT_GAP_TOLERANCE),
        Err(code) => return code,
    };
    let tolerance = tolerance.unwrap_or(configured);
    if !tolerance.is_finite() || tolerance < 0.0 {
        eprintln!("error: tolerance must be a non-negative number");
        return ExitCode::from(2);
    }

    let bars = match CsvAdapter::new(data_path.to_path_buf()).fetch_bars(None, None) {
        Ok(b) => b,
        Err(e) => return report(&e),
    };
    eprintln!("Loaded bars: {}", bars.len());

    let gaps = find_gaps(&bars, tolerance);
    let Some(summary) = summarize_gaps(&gaps) else {
        eprintln!("No gaps found");
        return ExitCode::SUCCESS;
    };

    eprintln!("Gaps found: {}", summary.count);
    eprintln!("max_rel_diff: {}", summary.max_relative_diff);
    eprintln!("min_rel_diff: {}", summary.min_relative_diff);

    for gap in &gaps {
        println!(
            "prev_ts={} ts={} prev_close={} open={} rel_diff_pct={:.3}%",
            gap.prev_timestamp.to_rfc3339(),
            gap.timestamp.to_rfc3339(),
            gap.prev_close,
            gap.open,
            gap.relative_diff * 100.0
        );
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return report(&e),
    };

    let ind = &config.indicators;
    eprintln!("\nIndicators:");
    eprintln!("  RSI fast/slow:    {} / {}", ind.rsi_fast_length, ind.rsi_slow_length);
    eprintln!("  Bollinger:        {} x {}", ind.bollinger_length, ind.bollinger_factor);
    eprintln!("  Envelope:         {} x {}", ind.envelope_length, ind.envelope_percent);
    eprintln!("  SMA:              {}", ind.sma_length);
    eprintln!("  Warm-up bars:     {}", ind.warmup_bars());
    eprintln!("\nBacktest:");
    eprintln!("  Starting balance: {}", config.starting_balance);
    eprintln!("  Position size:    {}", config.position_size_fraction);
    eprintln!("  Cooldown bars:    {}", config.cooldown_bars);
    eprintln!("  Periods/year:     {}", config.periods_per_year);
    eprintln!("\nFunding:");
    eprintln!("  Rate:             {}", config.funding.rate);
    eprintln!("  Interval hours:   {}", config.funding.interval_hours);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
