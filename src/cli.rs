//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, write_trade_log};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::retry::{RetryPolicy, RetryingDataPort};
use crate::domain::config_validation::{DataSettings, build_data_settings, build_strategy_params};
use crate::domain::error::AnchortraderError;
use crate::domain::ledger::TradeStats;
use crate::domain::position::ExitReason;
use crate::domain::resample::{normalize_minute_bars, resample_all};
use crate::domain::simulation::{SimulationResult, run_simulation};
use crate::domain::strategy::StrategyParams;
use crate::domain::timeline::build_master_timeline;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "anchortrader",
    about = "Anchored-VWAP trend-following backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over 1-minute bars
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Trade log CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the time range of a data file
    Info {
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, data, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data, config } => run_info(data, config.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, AnchortraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn resolve_data_path(
    cli_path: Option<PathBuf>,
    settings: &DataSettings,
) -> Result<PathBuf, AnchortraderError> {
    cli_path
        .or_else(|| settings.path.clone())
        .ok_or_else(|| AnchortraderError::missing("data", "path"))
}

fn run_backtest(
    config_path: &Path,
    data_override: Option<PathBuf>,
    output_path: Option<&Path>,
) -> Result<(), AnchortraderError> {
    // Stage 1: config
    let config = load_config(config_path)?;
    let params = build_strategy_params(&config)?;
    let settings = build_data_settings(&config)?;
    let policy = RetryPolicy::from_config(&config)?;
    let data_path = resolve_data_path(data_override, &settings)?;

    // Stage 2: data source
    eprintln!("Reading minute bars from {}", data_path.display());
    let data_port = RetryingDataPort::new(CsvAdapter::new(data_path), policy);

    // Stages 3-6: resample, indicators, align, simulate
    let result = run_backtest_pipeline(&data_port, &params, settings.start, settings.end)?;

    // Stage 7: report
    let stats = TradeStats::compute(&result.ledger);
    print_summary(&result, &stats);

    if let Some(output) = output_path {
        write_trade_log(output, result.ledger.trades())?;
        eprintln!("\nTrade log written to: {}", output.display());
    }
    Ok(())
}

/// Fetch, resample, compute indicators, align and simulate.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    params: &StrategyParams,
    start: Option<chrono::DateTime<chrono::Utc>>,
    end: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<SimulationResult, AnchortraderError> {
    params.validate()?;

    let raw = data_port.fetch_minute_bars(start, end)?;
    if raw.is_empty() {
        return Err(AnchortraderError::NoData {
            source_name: data_port.source_name(),
        });
    }

    let raw_len = raw.len();
    let minute = normalize_minute_bars(raw);
    if minute.len() < raw_len {
        tracing::warn!(
            dropped = raw_len - minute.len(),
            "duplicate minute timestamps dropped"
        );
    }

    let series = resample_all(minute);
    eprintln!(
        "Resampled {} minute bars into {} x 45m and {} x 4h",
        series.minute.len(),
        series.m45.len(),
        series.h4.len()
    );

    let timeline = build_master_timeline(&series, params).drop_warmup();
    if timeline.is_empty() {
        let minimum = params
            .trend_stoch_rsi
            .warmup()
            .max(2 * params.adx_length)
            + 1;
        return Err(AnchortraderError::InsufficientData {
            bars: series.h4.len(),
            minimum,
        });
    }
    eprintln!("  Processing: {} minute bars after warm-up", timeline.len());

    run_simulation(&timeline, params)
}

fn print_summary(result: &SimulationResult, stats: &TradeStats) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Bars Processed:   {}", result.bars_processed);
    eprintln!(
        "Total Trades:     {} ({} long / {} short)",
        stats.total_trades, stats.long_trades, stats.short_trades
    );
    eprintln!("Win Rate:         {:.2}%", stats.win_rate * 100.0);
    eprintln!("Total Net P&L:    {:.2} (points)", stats.net_pnl);
    eprintln!("Profit Factor:    {:.3}", stats.profit_factor);
    eprintln!("Avg Win / Loss:   {:.2} : 1", stats.avg_reward_risk);
    eprintln!("Average Win:      {:.2}", stats.avg_win);
    eprintln!("Average Loss:     {:.2}", stats.avg_loss);
    eprintln!("Largest Win:      {:.2}", stats.largest_win);
    eprintln!("Largest Loss:     {:.2}", stats.largest_loss);
    eprintln!("Avg Holding:      {:.1} min", stats.avg_holding_minutes);

    eprintln!("\n=== Exits ===");
    for reason in [
        ExitReason::StopLoss,
        ExitReason::Breakeven,
        ExitReason::TakeProfit,
        ExitReason::TrendFailure,
    ] {
        eprintln!("  {:<14}{}", reason.to_string(), stats.exit_count(reason));
    }

    if let Some(pos) = &result.open_position {
        eprintln!(
            "\nOpen at end: {} from {:.2} since {} (stop {:.2}, target {:.2})",
            pos.direction, pos.entry_price, pos.entry_timestamp, pos.stop_loss, pos.take_profit
        );
    }
}

fn run_validate(config_path: &Path) -> Result<(), AnchortraderError> {
    let config = load_config(config_path)?;
    let params = build_strategy_params(&config)?;
    let settings = build_data_settings(&config)?;
    RetryPolicy::from_config(&config)?;

    eprintln!("\nStrategy: {}", params.strategy);

    eprintln!("\nBias:");
    eprintln!(
        "  oversold {} / overbought {} / ADX > {}",
        params.bias.oversold_level, params.bias.overbought_level, params.bias.adx_threshold
    );

    eprintln!("\nIndicators to compute:");
    for ind in params.trend_indicators() {
        eprintln!("  4h   {}", ind);
    }
    for ind in params.short_indicators() {
        eprintln!("  45m  {}", ind);
    }

    eprintln!("\nRisk:");
    eprintln!(
        "  AVWAP stop {} x ATR, target {}R, breakeven at {}R",
        params.risk.sl_multiplier, params.risk.tp_multiplier, params.risk.breakeven_trigger_r
    );

    if !params.filters.is_empty() {
        eprintln!("\nEntry filters:");
        for f in &params.filters {
            eprintln!("  {}", f);
        }
    }

    if let Some(path) = &settings.path {
        eprintln!("\nData: {}", path.display());
    }

    eprintln!("\nConfiguration is valid");
    Ok(())
}

fn run_info(data: Option<PathBuf>, config_path: Option<&Path>) -> Result<(), AnchortraderError> {
    let (settings, policy) = match config_path {
        Some(path) => {
            let config = load_config(path)?;
            (
                build_data_settings(&config)?,
                RetryPolicy::from_config(&config)?,
            )
        }
        None => (
            DataSettings {
                path: None,
                start: None,
                end: None,
            },
            RetryPolicy::default(),
        ),
    };
    let data_path = resolve_data_path(data, &settings)?;
    let port = RetryingDataPort::new(CsvAdapter::new(data_path), policy);

    match port.get_data_range()? {
        Some((first, last, count)) => {
            println!("{}", port.source_name());
            println!("  first: {}", first);
            println!("  last:  {}", last);
            println!("  bars:  {}", count);
            Ok(())
        }
        None => Err(AnchortraderError::NoData {
            source_name: port.source_name(),
        }),
    }
}
