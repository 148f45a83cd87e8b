use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//raw per-step observation taken after each replayed bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub tick: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub equity: f64,
    pub position: f64,
}

//a point in the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub tick: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub equity: f64,
    pub position: f64,
    pub drawdown: f64,
    pub returns: f64,
}

//calculates the equity curve with drawdowns
pub fn calculate_equity_curve(samples: &[EquitySample], initial_balance: f64) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(samples.len());
    let mut peak = initial_balance;
    let mut prev_equity = initial_balance;

    for (i, sample) in samples.iter().enumerate() {
        if sample.equity > peak {
            peak = sample.equity;
        }

        let drawdown = if peak > 0.0 {
            (peak - sample.equity) / peak
        } else {
            0.0
        };

        let returns = if i == 0 {
            0.0
        } else {
            simple_return(prev_equity, sample.equity)
        };

        curve.push(EquityPoint {
            tick: sample.tick,
            timestamp: sample.timestamp,
            equity: sample.equity,
            position: sample.position,
            drawdown,
            returns,
        });
        prev_equity = sample.equity;
    }

    curve
}

//calculates maximum drawdown from equity curve
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    equity_curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}

//calculates returns from equity values
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .map(|pair| simple_return(pair[0], pair[1]))
        .collect()
}

//0 once equity has been wiped out
fn simple_return(prev: f64, curr: f64) -> f64 {
    if prev > 0.0 {
        (curr - prev) / prev
    } else {
        0.0
    }
}
