pub mod sma_crossover;

use crate::data::Bar;
use crate::engine::error::EngineError;
use crate::engine::exchange::Exchange;
use crate::engine::execution::Order;
use crate::portfolio::{Balance, PositionState};
use std::collections::VecDeque;

//strategy interface that all strategies must implement
pub trait Strategy: Send {
    //called once before the first bar
    fn on_start(&mut self, context: &mut StrategyContext<'_>) -> Result<(), EngineError>;

    //called after each bar has been handed to the exchange
    fn on_bar(&mut self, context: &mut StrategyContext<'_>, bar: &Bar) -> Result<(), EngineError>;

    //called once the bars are exhausted
    fn on_end(&mut self, context: &mut StrategyContext<'_>) -> Result<(), EngineError>;

    //returns the strategy name
    fn name(&self) -> &str;
}

//view of the replay a strategy acts on between two steps
pub struct StrategyContext<'a> {
    exchange: &'a mut Exchange,

    //ring buffer with limited lookback, oldest first
    bar_history: &'a VecDeque<Bar>,

    //orders executed by the step that just ran
    executed: &'a [Order],
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        exchange: &'a mut Exchange,
        bar_history: &'a VecDeque<Bar>,
        executed: &'a [Order],
    ) -> Self {
        StrategyContext {
            exchange,
            bar_history,
            executed,
        }
    }

    //returns the last n bars, oldest first
    pub fn get_bars(&self, n: usize) -> Vec<&Bar> {
        let len = self.bar_history.len();
        let start = len.saturating_sub(n);
        self.bar_history.range(start..).collect()
    }

    //returns the most recent bar
    pub fn last_bar(&self) -> Option<&Bar> {
        self.bar_history.back()
    }

    //returns the close prices for the last n bars
    pub fn get_close_prices(&self, n: usize) -> Vec<f64> {
        self.get_bars(n).iter().map(|b| b.close).collect()
    }

    //returns the number of bars in history
    pub fn bar_count(&self) -> usize {
        self.bar_history.len()
    }

    pub fn executed(&self) -> &[Order] {
        self.executed
    }

    pub fn position(&self) -> PositionState {
        self.exchange.position()
    }

    pub fn balance(&self) -> Balance {
        self.exchange.balance()
    }

    pub fn pending_len(&self) -> usize {
        self.exchange.pending_len()
    }

    //order placement goes straight to the exchange
    pub fn exchange(&mut self) -> &mut Exchange {
        self.exchange
    }
}

//helper function to calculate simple moving average
pub fn sma(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}
