use crate::config::ExchangeConfig;
use crate::data::Bar;
use crate::engine::error::EngineError;
use crate::engine::execution::{
    Order, OrderSide, PriceModel, REASON_ENTRY_LONG, REASON_ENTRY_SHORT, REASON_EXIT,
    REASON_LIQUIDATION,
};
use crate::engine::pending::{
    LimitDiagnostics, PendingKind, PendingOrder, PendingQueue, DROP_EXECUTION_REJECTED,
    DROP_POSITION_STATE_MISMATCH,
};
use crate::portfolio::{Account, Balance, CoverOutcome, PositionState};
use indexmap::IndexMap;
use log::{debug, warn};

//one executed trade before it gets an id and a balance snapshot
struct Execution<'a> {
    side: OrderSide,
    qty: f64,
    mid: f64,
    exec: f64,
    fee: f64,
    pnl: f64,
    equity_before: f64,
    reason: &'a str,
    stop_kind: &'a str,
    placed_tick: i64,
}

fn validate_fraction(fraction: f64) -> Result<(), EngineError> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidFraction)
    }
}

//single-asset, single-position simulated exchange
//owns balance, position, order history and the pending limit queue
#[derive(Debug, Clone)]
pub struct Exchange {
    symbol: String,
    fee: f64,
    prices: PriceModel,
    account: Account,
    last_price: f64,
    tick: i64,
    orders: Vec<Order>,
    next_order_id: u64,
    pending: PendingQueue,
    //pending id -> index into orders
    limit_fills: IndexMap<u64, usize>,
    last_bar: Option<Bar>,
}

impl Exchange {
    //negative balance and fee clamp to 0, slippage outside [0,1) resets to 0,
    //spread inside [0,1) is fixed, anything else selects the dynamic spread model
    pub fn new(
        symbol: impl Into<String>,
        start_usd: f64,
        fee: f64,
        slippage_pct: f64,
        spread_pct: Option<f64>,
    ) -> Self {
        Exchange {
            symbol: symbol.into(),
            fee: fee.max(0.0),
            prices: PriceModel::new(slippage_pct, spread_pct),
            account: Account::new(start_usd),
            last_price: 0.0,
            tick: 0,
            orders: Vec::new(),
            next_order_id: 0,
            pending: PendingQueue::new(),
            limit_fills: IndexMap::new(),
            last_bar: None,
        }
    }

    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self::new(
            config.symbol.clone(),
            config.start_usd,
            config.fee,
            config.slippage_pct,
            config.spread_pct,
        )
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn tick(&self) -> i64 {
        self.tick
    }

    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn position(&self) -> PositionState {
        self.account.position()
    }

    pub fn price_model(&self) -> &PriceModel {
        &self.prices
    }

    pub fn balance(&self) -> Balance {
        self.account.balance(self.last_price)
    }

    //full history in execution order, read-only
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingOrder> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    //the order a pending limit turned into, if it has executed
    pub fn limit_fill(&self, pending_id: u64) -> Option<&Order> {
        self.limit_fills
            .get(&pending_id)
            .and_then(|&index| self.orders.get(index))
    }

    pub fn limit_diagnostics(&self) -> LimitDiagnostics {
        self.pending.diagnostics()
    }

    //advances one bar, returns the first order executed on this tick
    pub(crate) fn tick_bar_at(&mut self, tick: i64, bar: &Bar) -> Result<Option<Order>, EngineError> {
        if let Some(tagged) = bar.symbol.as_deref() {
            if !self.symbol.is_empty() && tagged != self.symbol {
                return Err(EngineError::SymbolMismatch {
                    expected: self.symbol.clone(),
                    found: tagged.to_string(),
                });
            }
        }
        if !(bar.close > 0.0 && bar.close.is_finite()) {
            return Err(EngineError::NonPositiveClose(bar.close));
        }

        self.tick = tick.max(0);
        self.prices.update(bar.close);
        self.last_price = bar.close;
        let executed = self.process_pending(bar);
        self.last_bar = Some(bar.clone());
        Ok(executed)
    }

    //market buy with a fraction of the usd balance
    pub fn open_long(&mut self, fraction: f64) -> Result<Order, EngineError> {
        self.open_at_price(OrderSide::Buy, self.last_price, fraction, self.tick)
    }

    //market sell short with a fraction of the usd balance
    pub fn open_short(&mut self, fraction: f64) -> Result<Order, EngineError> {
        self.open_at_price(OrderSide::Sell, self.last_price, fraction, self.tick)
    }

    //queues a long entry, position state is only checked when it executes
    pub fn long_limit(&mut self, price: f64, fraction: f64) -> Result<u64, EngineError> {
        self.enqueue_open(PendingKind::OpenLong { fraction }, price, fraction)
    }

    pub fn short_limit(&mut self, price: f64, fraction: f64) -> Result<u64, EngineError> {
        self.enqueue_open(PendingKind::OpenShort { fraction }, price, fraction)
    }

    //market close of the open position, empty reason means exit
    pub fn close_deal(&mut self, reason: &str) -> Result<Order, EngineError> {
        if self.account.position().is_flat() {
            return Err(EngineError::NoPosition);
        }
        if self.last_price <= 0.0 {
            return Err(EngineError::PriceNotSet);
        }
        let reason = if reason.is_empty() { REASON_EXIT } else { reason };
        self.close_at_price(self.last_price, reason, "", self.tick)
    }

    //queues a close, stop_kind is a free-form label carried into the order record
    pub fn close_limit(
        &mut self,
        price: f64,
        reason: &str,
        stop_kind: &str,
    ) -> Result<u64, EngineError> {
        let price = self.limit_price(price)?;
        let reason = if reason.is_empty() { REASON_EXIT } else { reason };
        let kind = PendingKind::Close {
            reason: reason.to_string(),
            stop_kind: stop_kind.to_string(),
        };
        Ok(self
            .pending
            .push(kind, price, self.tick, self.last_bar.clone()))
    }

    //drops every queued limit order
    pub fn cancel_pending(&mut self) -> usize {
        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            debug!("cancelled {} pending orders on tick {}", cancelled, self.tick);
        }
        cancelled
    }

    fn limit_price(&self, price: f64) -> Result<f64, EngineError> {
        let price = if price > 0.0 && price.is_finite() {
            price
        } else {
            self.last_price
        };
        if !(price > 0.0) {
            return Err(EngineError::PriceNotSet);
        }
        Ok(price)
    }

    fn enqueue_open(
        &mut self,
        kind: PendingKind,
        price: f64,
        fraction: f64,
    ) -> Result<u64, EngineError> {
        let price = self.limit_price(price)?;
        validate_fraction(fraction)?;
        Ok(self
            .pending
            .push(kind, price, self.tick, self.last_bar.clone()))
    }

    fn open_at_price(
        &mut self,
        side: OrderSide,
        price: f64,
        fraction: f64,
        placed_tick: i64,
    ) -> Result<Order, EngineError> {
        if !self.account.position().is_flat() {
            return Err(EngineError::PositionOpen);
        }
        if self.last_price <= 0.0 {
            return Err(EngineError::PriceNotSet);
        }
        let mid = if price > 0.0 { price } else { self.last_price };
        validate_fraction(fraction)?;

        let equity_before = self.balance().equity;
        let notional = self.account.usd() * fraction;
        if notional <= 0.0 {
            return Err(EngineError::InvalidFraction);
        }
        let fee = notional * self.fee;
        let net = notional - fee;
        if net <= 0.0 {
            return Err(EngineError::InvalidFraction);
        }

        let exec = self.prices.exec_price(side, mid);
        let (qty, pnl, reason) = match side {
            OrderSide::Buy => {
                let qty = net / exec;
                self.account.open_long(notional, qty, exec);
                (qty, qty * (mid - exec), REASON_ENTRY_LONG)
            }
            OrderSide::Sell => {
                let qty = notional / exec;
                self.account.open_short(notional, net, qty, exec);
                (qty, qty * (exec - mid), REASON_ENTRY_SHORT)
            }
        };

        Ok(self.record_order(Execution {
            side,
            qty,
            mid,
            exec,
            fee,
            pnl,
            equity_before,
            reason,
            stop_kind: "",
            placed_tick,
        }))
    }

    //equity is priced at the closing level for the duration of the close
    fn close_at_price(
        &mut self,
        price: f64,
        reason: &str,
        stop_kind: &str,
        placed_tick: i64,
    ) -> Result<Order, EngineError> {
        let saved_last = self.last_price;
        self.last_price = price;
        let result = self.close_at_current(reason, stop_kind, placed_tick);
        self.last_price = saved_last;
        result
    }

    fn close_at_current(
        &mut self,
        reason: &str,
        stop_kind: &str,
        placed_tick: i64,
    ) -> Result<Order, EngineError> {
        let mid = self.last_price;
        let equity_before = self.balance().equity;

        let execution = match self.account.position() {
            PositionState::Flat => return Err(EngineError::NoPosition),
            PositionState::Long(qty) => {
                let exec = self.prices.exec_price(OrderSide::Sell, mid);
                let revenue = qty * exec;
                let fee = revenue * self.fee;
                self.account.close_long(revenue, fee);
                Execution {
                    side: OrderSide::Sell,
                    qty,
                    mid,
                    exec,
                    fee,
                    pnl: qty * (exec - mid),
                    equity_before,
                    reason,
                    stop_kind,
                    placed_tick,
                }
            }
            PositionState::Short(qty) => {
                let exec = self.prices.exec_price(OrderSide::Buy, mid);
                let cost = qty * exec;
                let fee = cost * self.fee;
                let mut execution = Execution {
                    side: OrderSide::Buy,
                    qty,
                    mid,
                    exec,
                    fee,
                    pnl: qty * (mid - exec),
                    equity_before,
                    reason,
                    stop_kind,
                    placed_tick,
                };
                if self.account.cover_short(cost + fee) == CoverOutcome::Liquidated {
                    //total loss, the fee is not netted
                    warn!(
                        "short of {} units liquidated at {} on tick {}, equity before {}",
                        qty, exec, self.tick, equity_before
                    );
                    execution.pnl = -equity_before;
                    execution.reason = REASON_LIQUIDATION;
                    execution.stop_kind = "";
                }
                execution
            }
        };

        Ok(self.record_order(execution))
    }

    //drains the fifo head by head, stops at the first head whose price is not touched
    fn process_pending(&mut self, bar: &Bar) -> Option<Order> {
        let mut first_executed = None;

        while let Some(head) = self.pending.head() {
            if self.tick <= head.placed_at_tick {
                break;
            }
            if !bar.contains(head.price) {
                self.pending.record_head_miss(self.tick, bar);
                break;
            }

            let flat = self.account.position().is_flat();
            if head.kind.is_open() != flat {
                if let Some(dropped) = self.pending.drop_head(DROP_POSITION_STATE_MISMATCH) {
                    warn!(
                        "dropping pending {} ({}) on tick {}: position state mismatch",
                        dropped.id,
                        dropped.kind.name(),
                        self.tick
                    );
                }
                continue;
            }

            let Some(order) = self.pending.pop_head() else {
                break;
            };
            let result = match &order.kind {
                PendingKind::OpenLong { fraction } => {
                    self.open_at_price(OrderSide::Buy, order.price, *fraction, order.placed_at_tick)
                }
                PendingKind::OpenShort { fraction } => {
                    self.open_at_price(OrderSide::Sell, order.price, *fraction, order.placed_at_tick)
                }
                PendingKind::Close { reason, stop_kind } => {
                    self.close_at_price(order.price, reason, stop_kind, order.placed_at_tick)
                }
            };

            match result {
                Ok(executed) => {
                    self.limit_fills.insert(order.id, self.orders.len() - 1);
                    first_executed.get_or_insert(executed);
                }
                Err(err) => {
                    self.pending.count_failure(DROP_EXECUTION_REJECTED);
                    warn!(
                        "pending {} ({}) rejected on tick {}: {}",
                        order.id,
                        order.kind.name(),
                        self.tick,
                        err
                    );
                }
            }
        }

        self.pending.record_blocked(self.tick, bar);
        first_executed
    }

    fn record_order(&mut self, execution: Execution<'_>) -> Order {
        self.next_order_id += 1;
        let balance = self.balance();
        let order = Order {
            id: self.next_order_id,
            symbol: self.symbol.clone(),
            side: execution.side,
            qty: execution.qty,
            mid_price: execution.mid,
            exec_price: execution.exec,
            fee: execution.fee,
            exec_pnl: execution.pnl,
            equity_before: execution.equity_before,
            reason: execution.reason.to_string(),
            stop_kind: execution.stop_kind.to_string(),
            position_after: balance.position,
            usd: balance.usd,
            short_cash: balance.short_cash,
            short_margin: balance.short_margin,
            equity: balance.equity,
            entry_price: balance.entry_price,
            tick: self.tick,
            placed_tick: execution.placed_tick,
            spread_pct: self.prices.spread_pct(),
            slippage_pct: self.prices.slippage_pct(),
        };
        debug!(
            "order {} {} {:?} qty={} price={} fee={} tick={}",
            order.id, order.reason, order.side, order.qty, order.exec_price, order.fee, order.tick
        );
        self.orders.push(order.clone());
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pending::{MISS_BLOCKED_BY_FIFO_HEAD, MISS_PRICE_NOT_IN_HL};
    use approx::assert_relative_eq;

    fn bar(low: f64, high: f64, close: f64) -> Bar {
        Bar::new(close, high, low, close).unwrap()
    }

    //zero-cost exchange primed at 100 on tick 1
    fn setup() -> Exchange {
        let mut exchange = Exchange::new("enj", 1000.0, 0.0, 0.0, Some(0.0));
        exchange.tick_bar_at(1, &bar(99.0, 101.0, 100.0)).unwrap();
        exchange
    }

    fn assert_position_invariant(exchange: &Exchange) {
        let balance = exchange.balance();
        assert_eq!(balance.position == 0.0, balance.entry_price == 0.0);
    }

    #[test]
    fn test_market_orders_need_a_price() {
        let mut exchange = Exchange::new("enj", 1000.0, 0.0, 0.0, Some(0.0));
        assert_eq!(exchange.open_long(1.0), Err(EngineError::PriceNotSet));
        assert_eq!(exchange.long_limit(0.0, 1.0), Err(EngineError::PriceNotSet));
        assert_eq!(exchange.close_deal(""), Err(EngineError::NoPosition));
    }

    #[test]
    fn test_one_position_at_a_time() {
        let mut exchange = setup();
        exchange.open_long(0.5).unwrap();
        assert_eq!(exchange.open_long(0.5), Err(EngineError::PositionOpen));
        assert_eq!(exchange.open_short(0.5), Err(EngineError::PositionOpen));
        exchange.close_deal("").unwrap();
        assert_eq!(exchange.close_deal(""), Err(EngineError::NoPosition));
        assert_position_invariant(&exchange);
    }

    #[test]
    fn test_invalid_fractions() {
        let mut exchange = setup();
        assert_eq!(exchange.open_long(0.0), Err(EngineError::InvalidFraction));
        assert_eq!(exchange.open_long(1.5), Err(EngineError::InvalidFraction));
        assert_eq!(exchange.open_short(f64::NAN), Err(EngineError::InvalidFraction));
        assert_eq!(exchange.long_limit(100.0, -1.0), Err(EngineError::InvalidFraction));

        let mut broke = Exchange::new("enj", 0.0, 0.0, 0.0, Some(0.0));
        broke.tick_bar_at(1, &bar(99.0, 101.0, 100.0)).unwrap();
        assert_eq!(broke.open_long(1.0), Err(EngineError::InvalidFraction));

        //a 100% fee leaves nothing to trade
        let mut greedy = Exchange::new("enj", 1000.0, 1.0, 0.0, Some(0.0));
        greedy.tick_bar_at(1, &bar(99.0, 101.0, 100.0)).unwrap();
        assert_eq!(greedy.open_short(1.0), Err(EngineError::InvalidFraction));
        assert!(greedy.orders().is_empty());
    }

    #[test]
    fn test_long_round_trip_charges_fee_twice() {
        let mut exchange = Exchange::new("enj", 1000.0, 0.001, 0.0, Some(0.0));
        exchange.tick_bar_at(1, &bar(99.0, 101.0, 100.0)).unwrap();

        let open = exchange.open_long(1.0).unwrap();
        assert_eq!(open.reason, REASON_ENTRY_LONG);
        assert_relative_eq!(open.qty, 9.99, epsilon = 1e-9);
        assert_eq!(open.exec_pnl, 0.0);
        assert_eq!(exchange.balance().usd, 0.0);

        let close = exchange.close_deal("").unwrap();
        assert_eq!(close.reason, REASON_EXIT);
        assert_eq!(close.exec_pnl, 0.0);
        assert_relative_eq!(exchange.balance().usd, 1000.0 * 0.999 * 0.999, epsilon = 1e-9);
        assert_position_invariant(&exchange);
    }

    #[test]
    fn test_short_profits_when_price_falls() {
        let mut exchange = setup();
        let open = exchange.open_short(1.0).unwrap();
        assert_relative_eq!(open.qty, 10.0);
        assert_eq!(open.position_after, -10.0);
        assert_relative_eq!(open.equity, 1000.0);

        exchange.tick_bar_at(2, &bar(79.0, 81.0, 80.0)).unwrap();
        assert_relative_eq!(exchange.balance().equity, 1200.0);

        let close = exchange.close_deal("").unwrap();
        assert_eq!(close.side, OrderSide::Buy);
        assert_relative_eq!(exchange.balance().usd, 1200.0);
        assert_eq!(exchange.balance().short_cash, 0.0);
        assert_eq!(exchange.balance().short_margin, 0.0);
    }

    #[test]
    fn test_spread_and_slippage_shape_entry_pnl() {
        let mut exchange = Exchange::new("enj", 1000.0, 0.0, 0.01, Some(0.02));
        exchange.tick_bar_at(1, &bar(99.0, 101.0, 100.0)).unwrap();
        let open = exchange.open_long(1.0).unwrap();
        assert_relative_eq!(open.exec_price, 100.0 * 1.01 * 1.01, epsilon = 1e-9);
        assert!(open.exec_pnl < 0.0);
        assert_eq!(open.spread_pct, 0.02);
        assert_eq!(open.slippage_pct, 0.01);
    }

    #[test]
    fn test_liquidation_wipes_everything() {
        let mut exchange = setup();
        exchange.open_short(1.0).unwrap();

        //buy-back of 10 units at 250 costs 2500, only 2000 is reserved
        exchange.tick_bar_at(2, &bar(240.0, 260.0, 250.0)).unwrap();
        let equity_before = exchange.balance().equity;
        let order = exchange.close_deal("").unwrap();

        assert_eq!(order.reason, REASON_LIQUIDATION);
        assert_eq!(order.equity_before, equity_before);
        assert_eq!(order.exec_pnl, -equity_before);
        let balance = exchange.balance();
        assert_eq!(balance.usd, 0.0);
        assert_eq!(balance.short_cash, 0.0);
        assert_eq!(balance.short_margin, 0.0);
        assert_eq!(balance.position, 0.0);
        assert_position_invariant(&exchange);
    }

    #[test]
    fn test_limit_never_fills_on_its_own_tick() {
        let mut exchange = setup();
        exchange.long_limit(100.0, 1.0).unwrap();

        //same tick again, price in range
        assert_eq!(exchange.tick_bar_at(1, &bar(99.0, 101.0, 100.0)).unwrap(), None);
        assert!(exchange.orders().is_empty());

        let executed = exchange.tick_bar_at(2, &bar(99.0, 101.0, 100.0)).unwrap();
        let executed = executed.unwrap();
        assert_eq!(executed.tick, 2);
        assert_eq!(executed.placed_tick, 1);
    }

    #[test]
    fn test_limit_executes_at_its_own_price() {
        let mut exchange = setup();
        let id = exchange.long_limit(95.0, 1.0).unwrap();
        exchange.tick_bar_at(2, &bar(90.0, 110.0, 105.0)).unwrap();

        let fill = exchange.limit_fill(id).unwrap();
        assert_eq!(fill.mid_price, 95.0);
        assert_eq!(fill.exec_price, 95.0);
        assert_eq!(exchange.last_price(), 105.0);
        assert_eq!(exchange.limit_fill(id + 1), None);
    }

    #[test]
    fn test_close_limit_prices_equity_at_its_own_level() {
        let mut exchange = setup();
        exchange.open_long(1.0).unwrap();
        let id = exchange.close_limit(95.0, "take-profit", "").unwrap();
        exchange.tick_bar_at(2, &bar(90.0, 110.0, 105.0)).unwrap();

        let fill = exchange.limit_fill(id).unwrap();
        assert_eq!(fill.reason, "take-profit");
        assert_relative_eq!(fill.equity_before, 950.0);
        assert_eq!(fill.exec_price, 95.0);
        assert_relative_eq!(fill.equity, 950.0);
        assert_eq!(exchange.last_price(), 105.0);
        assert_relative_eq!(exchange.balance().usd, 950.0);
    }

    #[test]
    fn test_queued_close_can_liquidate() {
        let mut exchange = setup();
        exchange.open_short(1.0).unwrap();
        let id = exchange.close_limit(250.0, "", "stop").unwrap();
        exchange.tick_bar_at(2, &bar(240.0, 260.0, 255.0)).unwrap();

        let fill = exchange.limit_fill(id).unwrap();
        assert_eq!(fill.reason, REASON_LIQUIDATION);
        assert_eq!(fill.stop_kind, "");
        //10 units priced at 250 against 2000 reserved
        assert_relative_eq!(fill.equity_before, -500.0);
        assert_eq!(fill.exec_pnl, -fill.equity_before);
        assert_eq!(exchange.last_price(), 255.0);
        let balance = exchange.balance();
        assert_eq!(balance.usd, 0.0);
        assert_eq!(balance.short_cash, 0.0);
        assert_eq!(balance.short_margin, 0.0);
        assert_position_invariant(&exchange);
    }

    #[test]
    fn test_nan_prices_are_rejected() {
        let mut exchange = setup();
        assert_eq!(
            exchange
                .tick_bar_at(2, &Bar::new_unchecked(1.0, 1.0, 1.0, f64::NAN))
                .map_err(|e| matches!(e, EngineError::NonPositiveClose(_))),
            Err(true)
        );
        assert!(exchange
            .tick_bar_at(2, &Bar::new_unchecked(1.0, 1.0, 1.0, f64::INFINITY))
            .is_err());
        assert_eq!(exchange.last_price(), 100.0);
        assert_eq!(exchange.tick(), 1);

        //falls back to the last valid price
        exchange.long_limit(f64::NAN, 1.0).unwrap();
        assert_eq!(exchange.pending().next().unwrap().price, 100.0);
        exchange.tick_bar_at(2, &bar(99.0, 101.0, 100.0)).unwrap();
        assert!(exchange.position().is_long());
        assert_position_invariant(&exchange);
    }

    #[test]
    fn test_fifo_head_blocks_the_queue() {
        let mut exchange = setup();
        let a = exchange.long_limit(120.0, 1.0).unwrap();
        let b = exchange.long_limit(100.0, 1.0).unwrap();

        assert_eq!(exchange.tick_bar_at(2, &bar(99.0, 101.0, 100.0)).unwrap(), None);
        assert_eq!(exchange.pending_len(), 2);

        let diag = exchange.limit_diagnostics();
        let misses: Vec<(&str, f64)> = diag
            .misses
            .iter()
            .map(|m| (m.reason.as_str(), m.limit_price))
            .collect();
        assert_eq!(
            misses,
            vec![(MISS_PRICE_NOT_IN_HL, 120.0), (MISS_BLOCKED_BY_FIFO_HEAD, 100.0)]
        );
        assert!(exchange.limit_fill(a).is_none());
        assert!(exchange.limit_fill(b).is_none());
    }

    #[test]
    fn test_several_heads_execute_in_one_tick() {
        let mut exchange = setup();
        exchange.open_long(1.0).unwrap();
        exchange.close_limit(100.0, "", "flip-close").unwrap();
        exchange.short_limit(100.0, 1.0).unwrap();

        let first = exchange.tick_bar_at(2, &bar(99.0, 101.0, 100.0)).unwrap().unwrap();
        assert_eq!(first.reason, REASON_EXIT);
        assert_eq!(first.stop_kind, "flip-close");
        assert_eq!(first.placed_tick, 1);

        let reasons: Vec<&str> = exchange.orders().iter().map(|o| o.reason.as_str()).collect();
        assert_eq!(reasons, vec![REASON_ENTRY_LONG, REASON_EXIT, REASON_ENTRY_SHORT]);
        assert!(exchange.position().is_short());
    }

    #[test]
    fn test_mismatched_pending_is_dropped_and_counted() {
        let mut exchange = setup();
        exchange.close_limit(100.0, "", "").unwrap();
        exchange.long_limit(100.0, 1.0).unwrap();
        exchange.long_limit(100.0, 1.0).unwrap();

        exchange.tick_bar_at(2, &bar(99.0, 101.0, 100.0)).unwrap();

        //close while flat dropped, first long fills, second long dropped
        assert_eq!(exchange.orders().len(), 1);
        assert_eq!(exchange.pending_len(), 0);
        assert_eq!(
            exchange.limit_diagnostics().count(DROP_POSITION_STATE_MISMATCH),
            2
        );
    }

    #[test]
    fn test_limit_price_defaults_to_last_price() {
        let mut exchange = setup();
        exchange.short_limit(0.0, 1.0).unwrap();
        exchange.close_limit(-1.0, "take-profit", "").unwrap();
        let prices: Vec<f64> = exchange.pending().map(|p| p.price).collect();
        assert_eq!(prices, vec![100.0, 100.0]);
        assert!(matches!(
            &exchange.pending().nth(1).unwrap().kind,
            PendingKind::Close { reason, .. } if reason == "take-profit"
        ));
    }

    #[test]
    fn test_tick_validation() {
        let mut exchange = setup();
        assert_eq!(
            exchange.tick_bar_at(2, &Bar::new_unchecked(1.0, 1.0, 0.0, 0.0)),
            Err(EngineError::NonPositiveClose(0.0))
        );
        assert!(matches!(
            exchange.tick_bar_at(2, &bar(1.0, 2.0, 1.5).with_symbol("btc")),
            Err(EngineError::SymbolMismatch { .. })
        ));
        assert_eq!(exchange.tick(), 1);

        exchange.tick_bar_at(-4, &bar(1.0, 2.0, 1.5).with_symbol("enj")).unwrap();
        assert_eq!(exchange.tick(), 0);
    }

    #[test]
    fn test_order_ids_are_sequential() {
        let mut exchange = setup();
        for _ in 0..3 {
            exchange.open_long(0.5).unwrap();
            exchange.close_deal("").unwrap();
        }
        let ids: Vec<u64> = exchange.orders().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_cancel_pending() {
        let mut exchange = setup();
        exchange.long_limit(100.0, 1.0).unwrap();
        assert_eq!(exchange.cancel_pending(), 1);
        exchange.tick_bar_at(2, &bar(99.0, 101.0, 100.0)).unwrap();
        assert!(exchange.orders().is_empty());
    }
}
