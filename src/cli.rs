//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvDataAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::{SimulationConfig, VariantKind};
use crate::domain::engine::{BacktestResult, run_backtest};
use crate::domain::error::SignalsimError;
use crate::domain::metrics::{Metrics, SymbolSummary};
use crate::domain::series::{SymbolSeries, group_by_symbol};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "signalsim", about = "Signal-driven trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantArg {
    Equity,
    Options,
    Futures,
}

impl From<VariantArg> for VariantKind {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Equity => VariantKind::Equity,
            VariantArg::Options => VariantKind::Options,
            VariantArg::Futures => VariantKind::Futures,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over a bar+signal CSV
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Strategy variant; overrides the config file
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
        /// Restrict the run to one symbol
        #[arg(long)]
        symbol: Option<String>,
        /// Directory for trades.csv and valuations.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
    },
    /// Show symbols and data ranges in a data file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            variant,
            symbol,
            output,
        } => run_backtest_command(
            &config,
            &data,
            variant,
            symbol.as_deref(),
            output.as_deref(),
        ),
        Command::Validate { config, variant } => run_validate(&config, variant),
        Command::Info { data } => run_info(&data),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        (&e).into()
    })
}

/// CLI flag wins; otherwise the `[backtest] variant` key; default equity.
pub fn resolve_variant(
    flag: Option<VariantArg>,
    config: &dyn ConfigPort,
) -> Result<VariantKind, SignalsimError> {
    if let Some(arg) = flag {
        return Ok(arg.into());
    }
    match config.get_string("backtest", "variant").as_deref() {
        None | Some("equity") => Ok(VariantKind::Equity),
        Some("options") => Ok(VariantKind::Options),
        Some("futures") => Ok(VariantKind::Futures),
        Some(other) => Err(SignalsimError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "variant".to_string(),
            reason: format!("unknown variant '{other}', expected equity, options or futures"),
        }),
    }
}

/// Fetch every requested symbol's series, skipping symbols whose data fails
/// to load. Errors only when nothing remains.
pub fn load_series(
    data_port: &dyn DataPort,
    symbol_filter: Option<&str>,
) -> Result<Vec<SymbolSeries>, SignalsimError> {
    let symbols = match symbol_filter {
        Some(symbol) => vec![symbol.to_string()],
        None => data_port.list_symbols()?,
    };

    let mut bars = Vec::new();
    for symbol in &symbols {
        match data_port.fetch_series(symbol, None, None) {
            Ok(mut series_bars) => bars.append(&mut series_bars),
            Err(e) => eprintln!("warning: skipping {} ({})", symbol, e),
        }
    }
    if bars.is_empty() {
        return Err(SignalsimError::Data {
            reason: "no symbols with data to backtest".to_string(),
        });
    }
    Ok(group_by_symbol(bars))
}

fn run_backtest_command(
    config_path: &PathBuf,
    data_path: &PathBuf,
    variant: Option<VariantArg>,
    symbol: Option<&str>,
    output: Option<&std::path::Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let kind = match resolve_variant(variant, &adapter) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let sim_config = match SimulationConfig::from_config(&adapter, kind) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Loading data from {}", data_path.display());
    let data_port = CsvDataAdapter::new(data_path.clone());
    let series = match load_series(&data_port, symbol) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Running backtest: {} symbols, initial capital {:.2}",
        series.len(),
        sim_config.initial_capital,
    );

    let result = run_backtest(&series, &sim_config);
    let metrics = Metrics::compute(
        result.ledger.closed_trades(),
        result.ledger.valuations(),
        result.initial_capital,
        result.final_capital,
    );
    let symbol_summaries = SymbolSummary::compute_per_symbol(result.ledger.closed_trades());

    print_summary(&result, &metrics, &symbol_summaries);

    if let Some(output_dir) = output {
        let report = CsvReportAdapter::new();
        if let Err(e) = report.write(&result, &metrics, output_dir) {
            eprintln!("error: failed to write report: {e}");
            return (&e).into();
        }
        eprintln!("\nReport written to: {}", output_dir.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult, metrics: &Metrics, summaries: &[SymbolSummary]) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Initial Capital:  {:.2}", result.initial_capital);
    eprintln!("Final Capital:    {:.2}", result.final_capital);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!(
        "Annualized:       {:.2}%",
        metrics.annualized_return * 100.0
    );
    eprintln!("Volatility:       {:.2}%", metrics.volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Calmar Ratio:     {:.2}", metrics.calmar_ratio);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Hold:         {:.1} days", metrics.avg_holding_days);

    if !summaries.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for summary in summaries {
            let sign = if summary.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}{:.0}",
                summary.symbol,
                summary.total_trades,
                summary.win_rate * 100.0,
                sign,
                summary.total_pnl,
            );
        }
    }

    if !result.unclosed_symbols.is_empty() {
        eprintln!(
            "\nwarning: positions left open (no final price): {}",
            result.unclosed_symbols.join(", "),
        );
    }
}

fn run_validate(config_path: &PathBuf, variant: Option<VariantArg>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let kind = match resolve_variant(variant, &adapter) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    match SimulationConfig::from_config(&adapter, kind) {
        Ok(_) => {
            eprintln!("Configuration OK");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_info(data_path: &PathBuf) -> ExitCode {
    let data_port = CsvDataAdapter::new(data_path.clone());
    let symbols = match data_port.list_symbols() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for symbol in &symbols {
        match data_port.data_range(symbol) {
            Ok(Some((first, last, count))) => {
                eprintln!("{symbol}: {count} bars, {first} to {last}");
            }
            Ok(None) => eprintln!("{symbol}: no data"),
            Err(e) => eprintln!("warning: {symbol}: {e}"),
        }
    }
    ExitCode::SUCCESS
}
