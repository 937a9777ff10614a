//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::backtest_timer::BacktestTimer;
use crate::adapters::binance_adapter::{BinanceAdapter, DEFAULT_BASE_URL};
use crate::adapters::csv_dataset_adapter::CsvDatasetAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::interval_timer::IntervalTimer;
use crate::adapters::provider::Provider;
use crate::adapters::replay_adapter::{DEFAULT_START_INDEX, ReplayAdapter};
use crate::adapters::svg_chart_adapter::SvgChartAdapter;
use crate::domain::config_validation::build_crossover_config;
use crate::domain::error::CandlebotError;
use crate::domain::history::HistoryRequest;
use crate::domain::market::Market;
use crate::domain::strategy::CrossoverStrategy;
use crate::domain::summary::TradeSummary;
use crate::domain::timeframe::Timeframe;
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::dataset_port::DatasetPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::runner;

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "candlebot", about = "Moving-average crossover trading bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a recorded dataset through the strategy
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        dataset: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Trade against live Binance candles
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Download history from Binance into a dataset directory
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render charts for a saved dataset
    Plot {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(long)]
        chart: PathBuf,
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
            dataset,
            output,
            chart,
        } => run_backtest(&config, dataset.as_ref(), output.as_ref(), chart.as_ref()),
        Command::Live { config, record } => run_live(&config, record.as_ref()),
        Command::Fetch {
            config,
            count,
            since,
            until,
            out,
        } => run_fetch(&config, count, since.as_deref(), until.as_deref(), &out),
        Command::Plot {
            config,
            dataset,
            chart,
        } => run_plot(&config, &dataset, &chart),
        Command::Validate { config } => run_validate(&config),
    }
}

fn exit_with(result: Result<(), CandlebotError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CandlebotError> {
    FileConfigAdapter::from_file(path).map_err(|e| CandlebotError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Where a backtest reads from and writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub dataset: PathBuf,
    pub start_index: usize,
    pub output: Option<PathBuf>,
    pub chart: Option<PathBuf>,
}

/// Command-line paths win over the `[backtest]` section.
pub fn build_backtest_settings(
    config: &dyn ConfigPort,
    dataset: Option<&PathBuf>,
    output: Option<&PathBuf>,
    chart: Option<&PathBuf>,
) -> Result<BacktestSettings, CandlebotError> {
    let dataset = dataset
        .cloned()
        .or_else(|| config.get_string("backtest", "dataset").map(PathBuf::from))
        .ok_or_else(|| CandlebotError::ConfigMissing {
            section: "backtest".into(),
            key: "dataset".into(),
        })?;

    let start_index = config.get_int("backtest", "start_index", DEFAULT_START_INDEX as i64);
    let start_index = usize::try_from(start_index).map_err(|_| CandlebotError::ConfigInvalid {
        section: "backtest".into(),
        key: "start_index".into(),
        reason: "start_index must be non-negative".into(),
    })?;

    Ok(BacktestSettings {
        dataset,
        start_index,
        output: output
            .cloned()
            .or_else(|| config.get_string("backtest", "output").map(PathBuf::from)),
        chart: chart.cloned(),
    })
}

pub fn build_binance_adapter(config: &dyn ConfigPort) -> Result<BinanceAdapter, CandlebotError> {
    let base_url = config
        .get_string("binance", "base_url")
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
    BinanceAdapter::new(&base_url, api_key.as_deref())
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, CandlebotError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CandlebotError::ConfigInvalid {
            section: "fetch".into(),
            key: key.into(),
            reason: format!("expected RFC 3339 timestamp: {}", e),
        })
}

/// Build and validate a history request from `fetch` arguments.
pub fn build_history_request(
    count: Option<usize>,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<HistoryRequest, CandlebotError> {
    let request = HistoryRequest {
        count,
        since: since.map(|s| parse_timestamp("since", s)).transpose()?,
        until: until.map(|s| parse_timestamp("until", s)).transpose()?,
    };
    request.selection()?;
    Ok(request)
}

fn runtime() -> Result<tokio::runtime::Runtime, CandlebotError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Load a dataset, warning about skipped files; an unreadable dataset is an error.
pub fn load_dataset(path: &Path) -> Result<Market, CandlebotError> {
    let loaded = CsvDatasetAdapter::new(path.to_path_buf()).load()?;
    if !loaded.skipped.is_empty() {
        warn!(
            skipped = loaded.skipped.len(),
            path = %path.display(),
            "some dataset files were skipped"
        );
    }
    if loaded.market.is_empty() {
        return Err(match loaded.skipped.first() {
            Some(first) => CandlebotError::DatasetParse {
                file: first.file.clone(),
                reason: format!(
                    "no readable frames in {} ({} files skipped)",
                    path.display(),
                    loaded.skipped.len()
                ),
            },
            None => CandlebotError::data(format!("dataset {} is empty", path.display())),
        });
    }
    info!(frames = loaded.market.len(), path = %path.display(), "loaded dataset");
    Ok(loaded.market)
}

/// Run a backtest and return the result market, writing outputs and charts if asked.
pub fn backtest(
    config: &dyn ConfigPort,
    settings: &BacktestSettings,
) -> Result<Market, CandlebotError> {
    let strategy_config = build_crossover_config(config)?;
    let market = Arc::new(load_dataset(&settings.dataset)?);
    if settings.start_index >= market.len() {
        return Err(CandlebotError::data(format!(
            "start index {} is beyond the {} frames in {}",
            settings.start_index,
            market.len(),
            settings.dataset.display()
        )));
    }

    let mut strategy = CrossoverStrategy::new(strategy_config)?;
    let mut provider =
        Provider::Replay(ReplayAdapter::new(market.clone(), settings.start_index));
    let mut timer = BacktestTimer::new(market, settings.start_index);

    let result = runtime()?.block_on(runner::run_backtest(
        &mut strategy,
        &mut provider,
        &mut timer,
    ))?;

    if let Some(output) = &settings.output {
        CsvDatasetAdapter::new(output.clone()).save(&result)?;
        info!(path = %output.display(), "wrote backtest output");
    }
    if let Some(stem) = &settings.chart {
        SvgChartAdapter::new().render(&result, stem)?;
    }
    Ok(result)
}

pub fn run_backtest(
    config_path: &Path,
    dataset: Option<&PathBuf>,
    output: Option<&PathBuf>,
    chart: Option<&PathBuf>,
) -> ExitCode {
    exit_with(backtest_command(config_path, dataset, output, chart))
}

fn backtest_command(
    config_path: &Path,
    dataset: Option<&PathBuf>,
    output: Option<&PathBuf>,
    chart: Option<&PathBuf>,
) -> Result<(), CandlebotError> {
    let config = load_config(config_path)?;
    let settings = build_backtest_settings(&config, dataset, output, chart)?;
    let result = backtest(&config, &settings)?;
    print!("{}", TradeSummary::compute(&result));
    Ok(())
}

fn run_live(config_path: &Path, record: Option<&PathBuf>) -> ExitCode {
    exit_with(live_command(config_path, record))
}

fn live_command(config_path: &Path, record: Option<&PathBuf>) -> Result<(), CandlebotError> {
    let config = load_config(config_path)?;
    let strategy_config = build_crossover_config(&config)?;
    let timeframe = Timeframe::try_from(strategy_config.timeframe_minutes)?;
    let provider = Provider::Live(build_binance_adapter(&config)?);
    let mut timer = IntervalTimer::new(strategy_config.symbols.clone(), timeframe);
    let recorder = record.map(|p| CsvDatasetAdapter::new(p.clone()));
    let mut strategy = CrossoverStrategy::new(strategy_config)?;

    runtime()?.block_on(runner::run_live(
        &mut strategy,
        &provider,
        &mut timer,
        recorder.as_ref().map(|r| r as &dyn DatasetPort),
    ))
}

fn run_fetch(
    config_path: &Path,
    count: Option<usize>,
    since: Option<&str>,
    until: Option<&str>,
    out: &Path,
) -> ExitCode {
    exit_with(fetch_command(config_path, count, since, until, out))
}

fn fetch_command(
    config_path: &Path,
    count: Option<usize>,
    since: Option<&str>,
    until: Option<&str>,
    out: &Path,
) -> Result<(), CandlebotError> {
    let config = load_config(config_path)?;
    let strategy_config = build_crossover_config(&config)?;
    let request = build_history_request(count, since, until)?;
    let provider = Provider::Live(build_binance_adapter(&config)?);

    let market = runtime()?.block_on(provider.get_history(
        &strategy_config.symbols,
        request,
        strategy_config.timeframe_minutes,
    ))?;
    CsvDatasetAdapter::new(out.to_path_buf()).save(&market)?;
    println!("Fetched {} frames into {}", market.len(), out.display());
    Ok(())
}

pub fn run_plot(config_path: &Path, dataset: &Path, chart: &Path) -> ExitCode {
    exit_with(plot_command(config_path, dataset, chart))
}

fn plot_command(config_path: &Path, dataset: &Path, chart: &Path) -> Result<(), CandlebotError> {
    // Config is loaded only to fail early on a broken file.
    load_config(config_path)?;
    let market = load_dataset(dataset)?;
    for path in SvgChartAdapter::new().render(&market, chart)? {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    exit_with(validate_command(config_path))
}

fn validate_command(config_path: &Path) -> Result<(), CandlebotError> {
    let config = load_config(config_path)?;
    let resolved = build_crossover_config(&config)?;
    let symbols: Vec<String> = resolved.symbols.iter().map(|s| s.to_string()).collect();

    println!("Configuration is valid.");
    println!("  symbols:           {}", symbols.join(", "));
    println!("  sma_window:        {}", resolved.sma_window);
    println!("  fma_window:        {}", resolved.fma_window);
    println!("  jitter:            {}", resolved.jitter);
    println!("  transaction_cost:  {}", resolved.transaction_cost);
    println!("  timeframe_minutes: {}", resolved.timeframe_minutes);
    println!(
        "  binance base_url:  {}",
        config
            .get_string("binance", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    );
    match build_backtest_settings(&config, None, None, None) {
        Ok(settings) => {
            println!("  backtest dataset:  {}", settings.dataset.display());
            println!("  start_index:       {}", settings.start_index);
        }
        Err(CandlebotError::ConfigMissing { .. }) => {
            println!("  backtest dataset:  (not set)");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
