use crate::config::ExchangeConfig;
use crate::data::Bar;
use crate::engine::error::EngineError;
use crate::engine::exchange::Exchange;
use crate::engine::execution::Order;
use log::debug;

//replays a fixed bar sequence into one exchange, one bar per step
#[derive(Debug, Clone)]
pub struct Emulator {
    bars: Vec<Bar>,
    index: usize,
    exchange: Exchange,
}

impl Emulator {
    pub fn new(config: &ExchangeConfig, bars: Vec<Bar>) -> Result<Self, EngineError> {
        Self::with_exchange(Exchange::from_config(config), bars)
    }

    //wraps an already-built exchange
    pub fn with_exchange(exchange: Exchange, bars: Vec<Bar>) -> Result<Self, EngineError> {
        if bars.is_empty() {
            return Err(EngineError::EmptyBars);
        }
        Ok(Emulator {
            bars,
            index: 0,
            exchange,
        })
    }

    //feeds the next bar at tick index+1, returns it with every order it executed
    pub fn next(&mut self) -> Result<(Bar, Vec<Order>), EngineError> {
        let bar = self
            .bars
            .get(self.index)
            .cloned()
            .ok_or(EngineError::NoMoreBars)?;

        let before = self.exchange.orders().len();
        self.exchange.tick_bar_at(self.index as i64 + 1, &bar)?;
        let executed = self.exchange.orders()[before..].to_vec();

        if !executed.is_empty() {
            debug!(
                "step {} executed {} orders",
                self.index + 1,
                executed.len()
            );
        }
        self.index += 1;
        Ok((bar, executed))
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    //for order placement between steps
    pub fn exchange_mut(&mut self) -> &mut Exchange {
        &mut self.exchange
    }

    //every configured bar, including ones not replayed yet
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    //bars already handed to the exchange
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.bars.len()
    }

    pub fn into_exchange(self) -> Exchange {
        self.exchange
    }
}
