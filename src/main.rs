use anyhow::{bail, Context, Result};
use barplay::prelude::*;
use clap::{Args, Parser, Subcommand};
use log::info;
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "barplay")]
#[command(about = "Replays OHLC bars through a simulated single-asset exchange", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run {
        //json run configuration, cannot be mixed with run flags
        #[arg(
            long,
            conflicts_with_all = [
                "data", "data_root", "coin", "daily", "hourly", "minute", "years", "months",
                "symbol", "start_usd", "fee", "slippage", "spread", "fast", "slow", "fraction",
                "limits", "max_lookback", "output_equity_csv", "output_trades_csv",
            ]
        )]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        exchange: ExchangeArgs,

        //fast sma window
        #[arg(long, default_value = "20")]
        fast: usize,

        //slow sma window
        #[arg(long, default_value = "50")]
        slow: usize,

        //share of usd committed per entry
        #[arg(long, default_value = "1.0")]
        fraction: f64,

        //queue limit orders at the bar average instead of trading at market
        #[arg(long)]
        limits: bool,

        //bars of history handed to the strategy
        #[arg(long, default_value = "500")]
        max_lookback: usize,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,

        //output path for executed orders csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,

        //writes the effective configuration as json
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    //evaluate a grid of sma windows in parallel
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        exchange: ExchangeArgs,

        //comma separated fast windows
        #[arg(long, value_delimiter = ',', default_value = "5,10,20")]
        fast: Vec<usize>,

        //comma separated slow windows
        #[arg(long, value_delimiter = ',', default_value = "30,50,100")]
        slow: Vec<usize>,

        #[arg(long, default_value = "1.0")]
        fraction: f64,

        #[arg(long)]
        limits: bool,

        //rows to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[derive(Args, Clone)]
struct DataArgs {
    //path to a single csv file
    #[arg(long)]
    data: Option<PathBuf>,

    //data root laid out as <root>/<coin>/<d|h|m>/
    #[arg(long)]
    data_root: Option<PathBuf>,

    #[arg(long)]
    coin: Option<String>,

    //daily bars
    #[arg(short = 'd', long)]
    daily: bool,

    //hourly bars
    #[arg(short = 'H', long)]
    hourly: bool,

    //minute bars
    #[arg(short = 'm', long)]
    minute: bool,

    //comma separated years
    #[arg(long, value_delimiter = ',')]
    years: Vec<i32>,

    //comma separated months (1-12)
    #[arg(long, value_delimiter = ',')]
    months: Vec<u32>,
}

impl DataArgs {
    fn to_source(&self) -> Result<DataSource> {
        match (&self.data, &self.data_root) {
            (Some(path), None) => Ok(DataSource::CsvFile { path: path.clone() }),
            (None, Some(root)) => {
                let coin = self
                    .coin
                    .clone()
                    .context("--coin is required with --data-root")?;
                Ok(DataSource::DataRoot {
                    root: root.clone(),
                    coin,
                    interval: Interval::from_flags(self.daily, self.hourly, self.minute)?,
                    filter: BarFilter {
                        years: self.years.clone(),
                        months: self.months.clone(),
                    },
                })
            }
            (Some(_), Some(_)) => bail!("use either --data or --data-root, not both"),
            (None, None) => bail!("--data or --data-root is required"),
        }
    }
}

#[derive(Args, Clone)]
struct ExchangeArgs {
    //symbol tag, bars tagged with another symbol are rejected
    #[arg(long, default_value = "")]
    symbol: String,

    //initial usd balance
    #[arg(long, default_value = "1000")]
    start_usd: f64,

    //fee as a fraction of notional
    #[arg(long, default_value = "0.001")]
    fee: f64,

    //slippage as a fraction of price
    #[arg(long, default_value = "0")]
    slippage: f64,

    //fixed spread, omit for the dynamic spread model
    #[arg(long)]
    spread: Option<f64>,
}

impl ExchangeArgs {
    fn to_config(&self) -> ExchangeConfig {
        ExchangeConfig {
            symbol: self.symbol.clone(),
            start_usd: self.start_usd,
            fee: self.fee,
            slippage_pct: self.slippage,
            spread_pct: self.spread,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            exchange,
            fast,
            slow,
            fraction,
            limits,
            max_lookback,
            output_equity_csv,
            output_trades_csv,
            save_config,
        } => {
            let run_config = match config {
                Some(path) => RunConfiguration::from_json_file(&path)
                    .with_context(|| format!("Failed to read config {:?}", path))?,
                None => {
                    let strategy = SmaParams {
                        fast_window: fast,
                        slow_window: slow,
                        fraction,
                        use_limits: limits,
                    };
                    strategy.validate()?;
                    RunConfiguration {
                        data: data.to_source()?,
                        exchange: exchange.to_config(),
                        strategy,
                        max_lookback,
                        output_equity_csv,
                        output_trades_csv,
                    }
                }
            };

            if let Some(path) = save_config {
                run_config.to_json_file(&path)?;
                println!("Configuration saved to {:?}", path);
            }
            run_backtest(&run_config)?;
        }
        Commands::Sweep {
            data,
            exchange,
            fast,
            slow,
            fraction,
            limits,
            top,
        } => {
            let source = data.to_source()?;
            run_sweep(&source, &exchange.to_config(), &fast, &slow, fraction, limits, top)?;
        }
    }

    Ok(())
}

//bars plus the bar count per year for annualized ratios
fn load_bars(source: &DataSource, symbol: &str) -> Result<(Vec<Bar>, f64)> {
    let (bars, periods_per_year) = match source {
        DataSource::CsvFile { path } => {
            let bars = load_csv(path).with_context(|| format!("Failed to load data from {:?}", path))?;
            (bars, 365.0)
        }
        DataSource::DataRoot {
            root,
            coin,
            interval,
            filter,
        } => {
            let bars = load_data_root(root, coin, *interval, filter)?;
            (bars, (interval.points_per_day() * 365) as f64)
        }
    };

    let bars = if symbol.is_empty() {
        bars
    } else {
        filter_by_symbol(&bars, symbol)
    };
    if bars.is_empty() {
        bail!("No bars left to replay");
    }
    Ok((bars, periods_per_year))
}

fn run_backtest(config: &RunConfiguration) -> Result<()> {
    println!("Barplay Exchange Emulator");
    println!("=========================\n");

    let (bars, periods_per_year) = load_bars(&config.data, &config.exchange.symbol)?;
    println!("Loaded {} bars", bars.len());
    if let (Some(first), Some(last)) = (
        bars.first().and_then(|b| b.timestamp),
        bars.last().and_then(|b| b.timestamp),
    ) {
        println!("Date range: {} to {}", first, last);
    }

    let params = &config.strategy;
    println!(
        "Strategy: SMA Crossover (fast={}, slow={}, fraction={}, {})",
        params.fast_window,
        params.slow_window,
        params.fraction,
        if params.use_limits { "limit" } else { "market" }
    );
    println!("Initial balance: ${:.2}", config.exchange.start_usd);
    println!("Fee: {}", config.exchange.fee);
    match config.exchange.spread_pct {
        Some(spread) => println!("Spread: {}\n", spread),
        None => println!("Spread: dynamic\n"),
    }

    let emulator = Emulator::new(&config.exchange, bars)?;
    let mut engine =
        BacktestEngine::new(emulator, config.max_lookback).with_periods_per_year(periods_per_year);
    let mut strategy = SmaCrossoverStrategy::from_params(params);
    let result = engine.run(&mut strategy)?;

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    if result.diagnostics.pending_total > 0 || !result.diagnostics.reasons.is_empty() {
        println!("\nLimit orders still pending: {}", result.diagnostics.pending_total);
        for (reason, count) in &result.diagnostics.reasons {
            println!("  {}: {}", reason, count);
        }
    }

    //save outputs if requested
    if let Some(equity_path) = &config.output_equity_csv {
        save_equity_csv(&result.equity_curve, equity_path)?;
        println!("\nEquity curve saved to {:?}", equity_path);
    }

    if let Some(trades_path) = &config.output_trades_csv {
        save_trades_csv(&result.orders, trades_path)?;
        println!("Trades saved to {:?}", trades_path);
    }

    Ok(())
}

struct SweepRow {
    fast: usize,
    slow: usize,
    summary: SummaryMetrics,
}

fn run_sweep(
    source: &DataSource,
    exchange: &ExchangeConfig,
    fast: &[usize],
    slow: &[usize],
    fraction: f64,
    limits: bool,
    top: usize,
) -> Result<()> {
    let grid = sweep_grid(fast, slow, fraction, limits)?;
    let (bars, periods_per_year) = load_bars(source, &exchange.symbol)?;
    info!("sweeping {} parameter pairs over {} bars", grid.len(), bars.len());

    //one independent exchange per run
    let mut rows = grid
        .par_iter()
        .map(|params| -> Result<SweepRow> {
            let (f, s) = (params.fast_window, params.slow_window);
            let emulator = Emulator::new(exchange, bars.clone())?;
            let mut engine =
                BacktestEngine::new(emulator, s).with_periods_per_year(periods_per_year);
            let mut strategy = SmaCrossoverStrategy::from_params(params);
            let result = engine
                .run(&mut strategy)
                .with_context(|| format!("run fast={} slow={} failed", f, s))?;
            Ok(SweepRow {
                fast: f,
                slow: s,
                summary: result.summary,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    rows.sort_by(|a, b| {
        b.summary
            .total_return
            .partial_cmp(&a.summary.total_return)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut table = Table::new();
    table.add_row(Row::new(
        ["Fast", "Slow", "Return", "Max DD", "Sharpe", "Trades", "Win Rate", "Liquidations"]
            .iter()
            .map(|h| Cell::new(h))
            .collect(),
    ));
    for row in rows.iter().take(top) {
        let s = &row.summary;
        table.add_row(Row::new(vec![
            Cell::new(&row.fast.to_string()),
            Cell::new(&row.slow.to_string()),
            Cell::new(&format!("{:.2}%", s.total_return_pct * 100.0)),
            Cell::new(&format!("{:.2}%", s.max_drawdown * 100.0)),
            Cell::new(&format!("{:.3}", s.sharpe_ratio)),
            Cell::new(&s.num_trades.to_string()),
            Cell::new(&format!("{:.2}%", s.win_rate * 100.0)),
            Cell::new(&s.liquidations.to_string()),
        ]));
    }
    table.printstd();

    Ok(())
}

//every fast < slow pair, validated before any data is loaded
fn sweep_grid(fast: &[usize], slow: &[usize], fraction: f64, limits: bool) -> Result<Vec<SmaParams>> {
    let grid: Vec<SmaParams> = fast
        .iter()
        .flat_map(|&f| slow.iter().map(move |&s| (f, s)))
        .filter(|&(f, s)| f > 0 && f < s)
        .map(|(fast_window, slow_window)| SmaParams {
            fast_window,
            slow_window,
            fraction,
            use_limits: limits,
        })
        .collect();
    if grid.is_empty() {
        bail!("No fast/slow pair with fast < slow");
    }
    for params in &grid {
        params.validate()?;
    }
    Ok(grid)
}

fn save_equity_csv(equity_curve: &[EquityPoint], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for point in equity_curve {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

fn save_trades_csv(orders: &[Order], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for order in orders {
        writer.serialize(order)?;
    }
    writer.flush()?;
    Ok(())
}
