use crate::config::SmaParams;
use crate::data::Bar;
use crate::engine::error::EngineError;
use crate::engine::execution::{OrderSide, REASON_EXIT};
use crate::portfolio::PositionState;
use crate::strategy::{sma, Strategy, StrategyContext};
use log::debug;

//sma crossover strategy
//goes long when fast sma crosses above slow sma
//goes short when fast sma crosses below slow sma
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    fast_window: usize,
    slow_window: usize,
    fraction: f64,

    //queue limit orders at the bar average instead of trading at market
    use_limits: bool,

    //state
    last_fast_sma: Option<f64>,
    last_slow_sma: Option<f64>,
}

impl SmaCrossoverStrategy {
    pub fn new(fast_window: usize, slow_window: usize, fraction: f64, use_limits: bool) -> Self {
        SmaCrossoverStrategy {
            fast_window,
            slow_window,
            fraction,
            use_limits,
            last_fast_sma: None,
            last_slow_sma: None,
        }
    }

    pub fn from_params(params: &SmaParams) -> Self {
        Self::new(
            params.fast_window,
            params.slow_window,
            params.fraction,
            params.use_limits,
        )
    }

    //returns some(buy) for a bullish crossover, some(sell) for a bearish one
    fn check_crossover(&self, fast_sma: f64, slow_sma: f64) -> Option<OrderSide> {
        if let (Some(prev_fast), Some(prev_slow)) = (self.last_fast_sma, self.last_slow_sma) {
            //bullish crossover fast crosses above slow
            if prev_fast <= prev_slow && fast_sma > slow_sma {
                return Some(OrderSide::Buy);
            }
            //bearish crossover fast crosses below slow
            if prev_fast >= prev_slow && fast_sma < slow_sma {
                return Some(OrderSide::Sell);
            }
        }
        None
    }

    fn flip_at_market(
        &self,
        context: &mut StrategyContext<'_>,
        signal: OrderSide,
    ) -> Result<(), EngineError> {
        let position = context.position();
        let already_there = match signal {
            OrderSide::Buy => position.is_long(),
            OrderSide::Sell => position.is_short(),
        };
        if already_there {
            return Ok(());
        }

        if !position.is_flat() {
            context.exchange().close_deal(REASON_EXIT)?;
        }
        //nothing left to trade with after a liquidation
        if context.balance().usd <= 0.0 {
            return Ok(());
        }
        match signal {
            OrderSide::Buy => context.exchange().open_long(self.fraction)?,
            OrderSide::Sell => context.exchange().open_short(self.fraction)?,
        };
        Ok(())
    }

    fn flip_with_limits(
        &self,
        context: &mut StrategyContext<'_>,
        signal: OrderSide,
        price: f64,
    ) -> Result<(), EngineError> {
        //stale orders from the previous signal would fill against the new one
        context.exchange().cancel_pending();

        let position = context.position();
        match (signal, position) {
            (OrderSide::Buy, PositionState::Long(_)) | (OrderSide::Sell, PositionState::Short(_)) => {
                return Ok(())
            }
            (_, PositionState::Flat) => {}
            _ => {
                context.exchange().close_limit(price, REASON_EXIT, "flip-close")?;
            }
        }

        match signal {
            OrderSide::Buy => context.exchange().long_limit(price, self.fraction)?,
            OrderSide::Sell => context.exchange().short_limit(price, self.fraction)?,
        };
        Ok(())
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn on_start(&mut self, _context: &mut StrategyContext<'_>) -> Result<(), EngineError> {
        //initialize state
        self.last_fast_sma = None;
        self.last_slow_sma = None;
        Ok(())
    }

    fn on_bar(&mut self, context: &mut StrategyContext<'_>, bar: &Bar) -> Result<(), EngineError> {
        //need at least slow_window bars to calculate
        if context.bar_count() < self.slow_window {
            return Ok(());
        }

        let closes = context.get_close_prices(self.slow_window);
        let fast_prices = &closes[closes.len().saturating_sub(self.fast_window)..];

        let (Some(fast_sma), Some(slow_sma)) = (sma(fast_prices), sma(&closes)) else {
            return Ok(());
        };

        if let Some(signal) = self.check_crossover(fast_sma, slow_sma) {
            debug!(
                "{:?} crossover: fast {:.6} slow {:.6}",
                signal, fast_sma, slow_sma
            );
            if self.use_limits {
                self.flip_with_limits(context, signal, bar.average)?;
            } else {
                self.flip_at_market(context, signal)?;
            }
        }

        //update state
        self.last_fast_sma = Some(fast_sma);
        self.last_slow_sma = Some(slow_sma);
        Ok(())
    }

    fn on_end(&mut self, context: &mut StrategyContext<'_>) -> Result<(), EngineError> {
        context.exchange().cancel_pending();
        if !context.position().is_flat() {
            context.exchange().close_deal(REASON_EXIT)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "SMA Crossover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::exchange::Exchange;
    use std::collections::VecDeque;

    fn setup(closes: &[f64]) -> (Exchange, VecDeque<Bar>) {
        let mut exchange = Exchange::new("enj", 1000.0, 0.0, 0.0, Some(0.0));
        let mut history = VecDeque::new();
        for (i, &close) in closes.iter().enumerate() {
            let bar = Bar::new(close, close, close, close).unwrap();
            exchange.tick_bar_at(i as i64 + 1, &bar).unwrap();
            history.push_back(bar);
        }
        (exchange, history)
    }

    #[test]
    fn test_that_crossover_is_detected_against_previous_values() {
        let mut strategy = SmaCrossoverStrategy::new(1, 2, 1.0, false);
        assert_eq!(strategy.check_crossover(2.0, 1.0), None);

        strategy.last_fast_sma = Some(1.0);
        strategy.last_slow_sma = Some(1.0);
        assert_eq!(strategy.check_crossover(2.0, 1.5), Some(OrderSide::Buy));
        assert_eq!(strategy.check_crossover(1.0, 1.5), Some(OrderSide::Sell));
    }

    #[test]
    fn test_that_market_mode_flips_position() {
        let mut strategy = SmaCrossoverStrategy::new(1, 2, 1.0, false);
        strategy.last_fast_sma = Some(9.0);
        strategy.last_slow_sma = Some(10.0);

        let (mut exchange, history) = setup(&[10.0, 12.0]);
        let bar = history[1].clone();
        {
            let mut context = StrategyContext::new(&mut exchange, &history, &[]);
            strategy.on_bar(&mut context, &bar).unwrap();
        }
        assert!(exchange.position().is_long());

        strategy.last_fast_sma = Some(12.0);
        strategy.last_slow_sma = Some(11.0);
        let bar = Bar::new(8.0, 8.0, 8.0, 8.0).unwrap();
        exchange.tick_bar_at(3, &bar).unwrap();
        let history: VecDeque<Bar> = vec![history[1].clone(), bar.clone()].into();
        {
            let mut context = StrategyContext::new(&mut exchange, &history, &[]);
            strategy.on_bar(&mut context, &bar).unwrap();
        }
        assert!(exchange.position().is_short());
        let reasons: Vec<&str> = exchange.orders().iter().map(|o| o.reason.as_str()).collect();
        assert_eq!(reasons, vec!["entry-long", "exit", "entry-short"]);
    }

    #[test]
    fn test_that_limit_mode_queues_at_average() {
        let mut strategy = SmaCrossoverStrategy::new(1, 2, 0.5, true);
        strategy.last_fast_sma = Some(9.0);
        strategy.last_slow_sma = Some(10.0);

        let (mut exchange, history) = setup(&[10.0, 12.0]);
        let bar = history[1].clone();
        let mut context = StrategyContext::new(&mut exchange, &history, &[]);
        strategy.on_bar(&mut context, &bar).unwrap();

        assert!(context.position().is_flat());
        assert_eq!(context.pending_len(), 1);
        let head = exchange.pending().next().unwrap();
        assert_eq!(head.price, 12.0);
    }

    #[test]
    fn test_that_on_end_closes_open_position() {
        let mut strategy = SmaCrossoverStrategy::new(1, 2, 1.0, false);
        let (mut exchange, history) = setup(&[10.0]);
        exchange.open_short(1.0).unwrap();
        exchange.long_limit(9.0, 1.0).unwrap();

        let mut context = StrategyContext::new(&mut exchange, &history, &[]);
        strategy.on_end(&mut context).unwrap();

        assert!(exchange.position().is_flat());
        assert_eq!(exchange.pending_len(), 0);
        assert_eq!(exchange.orders().last().unwrap().reason, "exit");
    }
}
