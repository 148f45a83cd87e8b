use crate::engine::execution::Order;
use crate::metrics::timeseries::{calculate_returns, max_drawdown, EquityPoint};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_balance: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub num_orders: usize,
    pub num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    pub total_fees: f64,
    pub liquidations: usize,
    pub exposure: f64,
}

impl SummaryMetrics {
    //periods_per_year annualizes sharpe and sortino (365 for daily crypto bars)
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        orders: &[Order],
        initial_balance: f64,
        periods_per_year: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);

        let total_return = final_equity - initial_balance;
        let total_return_pct = if initial_balance > 0.0 {
            total_return / initial_balance
        } else {
            0.0
        };

        let equity_values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = calculate_returns(&equity_values);
        let trade_stats = calculate_trade_statistics(orders);

        SummaryMetrics {
            initial_balance,
            final_equity,
            total_return,
            total_return_pct,
            cagr: calculate_cagr(equity_curve, initial_balance, final_equity),
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: calculate_sharpe_ratio(&returns, periods_per_year),
            sortino_ratio: calculate_sortino_ratio(&returns, periods_per_year),
            num_orders: orders.len(),
            num_trades: trade_stats.num_trades,
            num_winning_trades: trade_stats.num_winning_trades,
            num_losing_trades: trade_stats.num_losing_trades,
            win_rate: trade_stats.win_rate,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            profit_factor: trade_stats.profit_factor,
            total_fees: orders.iter().map(|o| o.fee).sum(),
            liquidations: orders.iter().filter(|o| o.is_liquidation()).count(),
            exposure: calculate_exposure(equity_curve),
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let rows = [
            ("Initial Balance", format!("${:.2}", self.initial_balance)),
            ("Final Equity", format!("${:.2}", self.final_equity)),
            (
                "Total Return",
                format!(
                    "${:.2} ({:.2}%)",
                    self.total_return,
                    self.total_return_pct * 100.0
                ),
            ),
            ("CAGR", format!("{:.2}%", self.cagr)),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.3}", self.sortino_ratio)),
            ("Orders", format!("{}", self.num_orders)),
            ("Round Trips", format!("{}", self.num_trades)),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Avg Win", format!("${:.2}", self.avg_win)),
            ("Avg Loss", format!("${:.2}", self.avg_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Fees Paid", format!("${:.2}", self.total_fees)),
            ("Liquidations", format!("{}", self.liquidations)),
            ("Exposure", format!("{:.2}%", self.exposure * 100.0)),
        ];

        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));
        for (name, value) in rows.iter() {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(value)]));
        }
        table.printstd();
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    num_trades: usize,
    num_winning_trades: usize,
    num_losing_trades: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    largest_win: f64,
    largest_loss: f64,
}

//round trip pnl: equity after the closing order minus equity before the entry
pub fn round_trip_pnls(orders: &[Order]) -> Vec<f64> {
    let mut round_trips = Vec::new();
    let mut entry: Option<&Order> = None;

    for order in orders {
        if order.is_entry() {
            entry = Some(order);
        } else if let Some(open) = entry.take() {
            round_trips.push(order.equity - open.equity_before);
        }
    }

    round_trips
}

fn calculate_trade_statistics(orders: &[Order]) -> TradeStats {
    let round_trips = round_trip_pnls(orders);
    if round_trips.is_empty() {
        return TradeStats::default();
    }

    let winning_trades: Vec<f64> = round_trips.iter().copied().filter(|&p| p > 0.0).collect();
    let losing_trades: Vec<f64> = round_trips.iter().copied().filter(|&p| p < 0.0).collect();

    let num_winning = winning_trades.len();
    let num_losing = losing_trades.len();
    let total = round_trips.len();

    let avg_win = if num_winning > 0 {
        winning_trades.iter().sum::<f64>() / num_winning as f64
    } else {
        0.0
    };

    let avg_loss = if num_losing > 0 {
        losing_trades.iter().sum::<f64>() / num_losing as f64
    } else {
        0.0
    };

    let total_wins: f64 = winning_trades.iter().sum();
    let total_losses: f64 = losing_trades.iter().sum::<f64>().abs();

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    TradeStats {
        num_trades: total,
        num_winning_trades: num_winning,
        num_losing_trades: num_losing,
        win_rate: num_winning as f64 / total as f64,
        avg_win,
        avg_loss,
        profit_factor,
        largest_win: winning_trades.iter().fold(0.0f64, |a, &b| a.max(b)),
        largest_loss: losing_trades.iter().fold(0.0f64, |a, &b| a.min(b)),
    }
}

//needs timestamps on the first and last point
fn calculate_cagr(equity_curve: &[EquityPoint], initial_balance: f64, final_equity: f64) -> f64 {
    let (Some(start), Some(end)) = (
        equity_curve.first().and_then(|p| p.timestamp),
        equity_curve.last().and_then(|p| p.timestamp),
    ) else {
        return 0.0;
    };

    let years = (end - start).num_days() as f64 / 365.25;
    if years <= 0.0 || initial_balance <= 0.0 || final_equity <= 0.0 {
        return 0.0;
    }
    ((final_equity / initial_balance).powf(1.0 / years) - 1.0) * 100.0
}

fn calculate_sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }

    (mean / std_dev) * periods_per_year.sqrt()
}

fn calculate_sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();

    //downside deviation (only negative returns)
    let negative_returns: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();

    if negative_returns.is_empty() {
        return if mean > 0.0 { f64::INFINITY } else { 0.0 };
    }

    let downside_dev = negative_returns.std_dev();

    if !downside_dev.is_finite() || downside_dev == 0.0 {
        return 0.0;
    }

    (mean / downside_dev) * periods_per_year.sqrt()
}

//share of steps that ended with an open position
fn calculate_exposure(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let in_market = equity_curve.iter().filter(|p| p.position != 0.0).count();
    in_market as f64 / equity_curve.len() as f64
}
