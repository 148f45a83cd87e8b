use crate::data::Bar;
use indexmap::IndexMap;
use log::trace;
use serde::Serialize;
use std::collections::VecDeque;

pub const MISS_AWAIT_NEXT_CANDLE: &str = "await_next_candle";
pub const MISS_PRICE_NOT_IN_HL: &str = "price_not_in_hl";
pub const MISS_BLOCKED_BY_FIFO_HEAD: &str = "blocked_by_fifo_head";
pub const DROP_POSITION_STATE_MISMATCH: &str = "position_state_mismatch";
pub const DROP_EXECUTION_REJECTED: &str = "execution_rejected";
pub const DROP_CANCELLED: &str = "cancelled";

//what a queued limit order will do once its price is touched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PendingKind {
    OpenLong { fraction: f64 },
    OpenShort { fraction: f64 },
    Close { reason: String, stop_kind: String },
}

impl PendingKind {
    pub fn name(&self) -> &'static str {
        match self {
            PendingKind::OpenLong { .. } => "open_long",
            PendingKind::OpenShort { .. } => "open_short",
            PendingKind::Close { .. } => "close",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, PendingKind::Close { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingOrder {
    pub id: u64,
    pub kind: PendingKind,
    pub price: f64,
    pub placed_at_tick: i64,
    pub last_reason: &'static str,
    pub placed_bar: Option<Bar>,
}

//a tick where a queued order could not execute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitMiss {
    pub reason: String,
    pub kind: String,
    pub limit_price: f64,
    pub placed_tick: i64,
    pub check_tick: i64,
    pub prev_bar: Option<Bar>,
    pub curr_bar: Bar,
}

impl LimitMiss {
    fn new(reason: &str, order: &PendingOrder, check_tick: i64, bar: &Bar) -> Self {
        LimitMiss {
            reason: reason.to_string(),
            kind: order.kind.name().to_string(),
            limit_price: order.price,
            placed_tick: order.placed_at_tick,
            check_tick,
            prev_bar: order.placed_bar.clone(),
            curr_bar: bar.clone(),
        }
    }
}

//failure counts over dropped and still-queued orders plus the full miss log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LimitDiagnostics {
    pub pending_total: usize,
    pub reasons: IndexMap<String, usize>,
    pub misses: Vec<LimitMiss>,
}

impl LimitDiagnostics {
    pub fn count(&self, reason: &str) -> usize {
        self.reasons.get(reason).copied().unwrap_or(0)
    }
}

//fifo of limit orders, only the head is ever matched
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    orders: VecDeque<PendingOrder>,
    next_id: u64,
    failed: IndexMap<&'static str, usize>,
    misses: Vec<LimitMiss>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    //enqueues and returns the new pending id, ids are independent of order ids
    pub fn push(
        &mut self,
        kind: PendingKind,
        price: f64,
        placed_at_tick: i64,
        placed_bar: Option<Bar>,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.orders.push_back(PendingOrder {
            id,
            kind,
            price,
            placed_at_tick,
            last_reason: MISS_AWAIT_NEXT_CANDLE,
            placed_bar,
        });
        id
    }

    pub fn head(&self) -> Option<&PendingOrder> {
        self.orders.front()
    }

    pub fn pop_head(&mut self) -> Option<PendingOrder> {
        self.orders.pop_front()
    }

    //removes the head without executing it, counted under reason
    pub fn drop_head(&mut self, reason: &'static str) -> Option<PendingOrder> {
        let dropped = self.orders.pop_front()?;
        self.count_failure(reason);
        Some(dropped)
    }

    //head was eligible but its price was not touched
    pub fn record_head_miss(&mut self, check_tick: i64, bar: &Bar) {
        let Some(head) = self.orders.front_mut() else {
            return;
        };
        head.last_reason = MISS_PRICE_NOT_IN_HL;
        let miss = LimitMiss::new(MISS_PRICE_NOT_IN_HL, head, check_tick, bar);
        trace!(
            "limit {} ({}) at {} missed bar [{}, {}] on tick {}",
            head.id,
            miss.kind,
            head.price,
            bar.low,
            bar.high,
            check_tick
        );
        self.misses.push(miss);
        self.count_failure(MISS_PRICE_NOT_IN_HL);
    }

    //everything behind the head that was already eligible stays queued but is logged
    pub fn record_blocked(&mut self, check_tick: i64, bar: &Bar) {
        for order in self.orders.iter_mut().skip(1) {
            if check_tick <= order.placed_at_tick {
                continue;
            }
            order.last_reason = MISS_BLOCKED_BY_FIFO_HEAD;
            trace!("limit {} blocked by fifo head on tick {}", order.id, check_tick);
            self.misses.push(LimitMiss::new(
                MISS_BLOCKED_BY_FIFO_HEAD,
                order,
                check_tick,
                bar,
            ));
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.orders.len();
        self.orders.clear();
        if cancelled > 0 {
            *self.failed.entry(DROP_CANCELLED).or_insert(0) += cancelled;
        }
        cancelled
    }

    pub fn count_failure(&mut self, reason: &'static str) {
        *self.failed.entry(reason).or_insert(0) += 1;
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOrder> {
        self.orders.iter()
    }

    pub fn misses(&self) -> &[LimitMiss] {
        &self.misses
    }

    pub fn diagnostics(&self) -> LimitDiagnostics {
        let mut out = LimitDiagnostics::default();
        for (reason, count) in &self.failed {
            *out.reasons.entry(reason.to_string()).or_insert(0) += count;
            out.pending_total += count;
        }
        for order in &self.orders {
            *out.reasons.entry(order.last_reason.to_string()).or_insert(0) += 1;
            out.pending_total += 1;
        }
        out.misses = self.misses.clone();
        out
    }
}
