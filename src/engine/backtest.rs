use crate::data::Bar;
use crate::engine::emulator::Emulator;
use crate::engine::execution::Order;
use crate::engine::pending::LimitDiagnostics;
use crate::metrics::{calculate_equity_curve, EquityPoint, EquitySample, SummaryMetrics};
use crate::strategy::{Strategy, StrategyContext};
use anyhow::Context;
use log::info;
use std::collections::VecDeque;

//result of a backtest
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub summary: SummaryMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub orders: Vec<Order>,
    pub diagnostics: LimitDiagnostics,
}

//drives an emulator step by step and lets a strategy trade between steps
pub struct BacktestEngine {
    emulator: Emulator,
    max_lookback: usize,
    periods_per_year: f64,
    bar_history: VecDeque<Bar>,
    samples: Vec<EquitySample>,
}

impl BacktestEngine {
    pub fn new(emulator: Emulator, max_lookback: usize) -> Self {
        let max_lookback = max_lookback.max(1);
        BacktestEngine {
            emulator,
            max_lookback,
            periods_per_year: 365.0,
            bar_history: VecDeque::with_capacity(max_lookback),
            samples: Vec::new(),
        }
    }

    //bars per year used to annualize sharpe and sortino
    pub fn with_periods_per_year(mut self, periods_per_year: f64) -> Self {
        if periods_per_year > 0.0 {
            self.periods_per_year = periods_per_year;
        }
        self
    }

    //runs the backtest with the given strategy
    pub fn run(&mut self, strategy: &mut dyn Strategy) -> anyhow::Result<BacktestResult> {
        let initial_balance = self.emulator.exchange().balance().equity;
        info!(
            "running {} over {} bars from {:.2} usd",
            strategy.name(),
            self.emulator.bars().len(),
            initial_balance
        );

        {
            let mut context =
                StrategyContext::new(self.emulator.exchange_mut(), &self.bar_history, &[]);
            strategy
                .on_start(&mut context)
                .context("strategy failed on start")?;
        }

        loop {
            let (bar, executed) = match self.emulator.next() {
                Ok(step) => step,
                Err(err) if err.is_exhausted() => break,
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("replay failed at bar {}", self.emulator.position() + 1)
                    })
                }
            };

            if self.bar_history.len() >= self.max_lookback {
                self.bar_history.pop_front();
            }
            self.bar_history.push_back(bar.clone());

            let tick = self.emulator.exchange().tick();
            {
                let mut context = StrategyContext::new(
                    self.emulator.exchange_mut(),
                    &self.bar_history,
                    &executed,
                );
                strategy
                    .on_bar(&mut context, &bar)
                    .with_context(|| format!("strategy failed on tick {}", tick))?;
            }

            self.record_sample(bar.timestamp);
        }

        {
            let mut context =
                StrategyContext::new(self.emulator.exchange_mut(), &self.bar_history, &[]);
            strategy
                .on_end(&mut context)
                .context("strategy failed on end")?;
        }

        //orders placed at the end execute on the last tick
        let balance = self.emulator.exchange().balance();
        if let Some(last) = self.samples.last_mut() {
            last.equity = balance.equity;
            last.position = balance.position;
        }

        let result = self.build_result(strategy.name(), initial_balance);
        info!(
            "{} finished with equity {:.2} after {} orders",
            result.strategy, result.summary.final_equity, result.summary.num_orders
        );
        Ok(result)
    }

    fn record_sample(&mut self, timestamp: Option<chrono::DateTime<chrono::Utc>>) {
        let exchange = self.emulator.exchange();
        let balance = exchange.balance();
        self.samples.push(EquitySample {
            tick: exchange.tick(),
            timestamp,
            equity: balance.equity,
            position: balance.position,
        });
    }

    fn build_result(&self, strategy: &str, initial_balance: f64) -> BacktestResult {
        let exchange = self.emulator.exchange();
        let equity_curve = calculate_equity_curve(&self.samples, initial_balance);
        let orders = exchange.orders().to_vec();
        let summary = SummaryMetrics::from_backtest(
            &equity_curve,
            &orders,
            initial_balance,
            self.periods_per_year,
        );

        BacktestResult {
            strategy: strategy.to_string(),
            summary,
            equity_curve,
            orders,
            diagnostics: exchange.limit_diagnostics(),
        }
    }

    pub fn emulator(&self) -> &Emulator {
        &self.emulator
    }
}
