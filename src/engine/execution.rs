use serde::{Deserialize, Serialize};

pub const REASON_ENTRY_LONG: &str = "entry-long";
pub const REASON_ENTRY_SHORT: &str = "entry-short";
pub const REASON_EXIT: &str = "exit";
pub const REASON_STOP_LOSS: &str = "stop-loss";
pub const REASON_LIQUIDATION: &str = "liquidation";

//dynamic spread: 1bp base widened by 1% of the bar-to-bar abs return, within [0.5bp, 20bp]
const SPREAD_BASE: f64 = 0.0001;
const SPREAD_MIN: f64 = 0.00005;
const SPREAD_MAX: f64 = 0.0020;
const SPREAD_RETURN_WEIGHT: f64 = 0.01;

//order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    //+1 for the side that pays more when prices are worse, -1 otherwise
    pub fn adverse_sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

//executed trade, append-only history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: f64,
    pub mid_price: f64,
    pub exec_price: f64,
    pub fee: f64,
    pub exec_pnl: f64,
    pub equity_before: f64,
    pub reason: String,
    pub stop_kind: String,
    pub position_after: f64,
    pub usd: f64,
    pub short_cash: f64,
    pub short_margin: f64,
    pub equity: f64,
    pub entry_price: f64,
    pub tick: i64,
    pub placed_tick: i64,
    pub spread_pct: f64,
    pub slippage_pct: f64,
}

impl Order {
    pub fn is_entry(&self) -> bool {
        self.reason == REASON_ENTRY_LONG || self.reason == REASON_ENTRY_SHORT
    }

    pub fn is_liquidation(&self) -> bool {
        self.reason == REASON_LIQUIDATION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadMode {
    //fixed percentage, never touched by the dynamic model
    Manual,
    Dynamic,
}

//turns a quoted mid into an execution price: spread first, then slippage
#[derive(Debug, Clone)]
pub struct PriceModel {
    mode: SpreadMode,
    spread_pct: f64,
    slippage_pct: f64,
    prev_price: f64,
}

fn in_unit_range(value: f64) -> bool {
    (0.0..1.0).contains(&value)
}

impl PriceModel {
    //out-of-range slippage resets to 0, missing or out-of-range spread selects the dynamic model
    pub fn new(slippage_pct: f64, spread_pct: Option<f64>) -> Self {
        let slippage_pct = if in_unit_range(slippage_pct) {
            slippage_pct
        } else {
            0.0
        };

        let (mode, spread_pct) = match spread_pct {
            Some(pct) if in_unit_range(pct) => (SpreadMode::Manual, pct),
            _ => (SpreadMode::Dynamic, 0.0),
        };

        PriceModel {
            mode,
            spread_pct,
            slippage_pct,
            prev_price: 0.0,
        }
    }

    pub fn mode(&self) -> SpreadMode {
        self.mode
    }

    pub fn spread_pct(&self) -> f64 {
        self.spread_pct
    }

    pub fn slippage_pct(&self) -> f64 {
        self.slippage_pct
    }

    //feeds the latest close into the spread model
    pub fn update(&mut self, price: f64) {
        if self.mode == SpreadMode::Manual {
            self.prev_price = price;
            return;
        }
        if price <= 0.0 {
            return;
        }

        let extra = if self.prev_price > 0.0 {
            (price - self.prev_price).abs() / self.prev_price * SPREAD_RETURN_WEIGHT
        } else {
            0.0
        };

        self.spread_pct = (SPREAD_BASE + extra).clamp(SPREAD_MIN, SPREAD_MAX);
        self.prev_price = price;
    }

    pub fn exec_price(&self, side: OrderSide, mid: f64) -> f64 {
        self.apply_slippage(side, self.apply_spread(side, mid))
    }

    //half the spread on each side
    fn apply_spread(&self, side: OrderSide, price: f64) -> f64 {
        if price <= 0.0 || self.spread_pct <= 0.0 {
            return price;
        }
        price * (1.0 + side.adverse_sign() * self.spread_pct / 2.0)
    }

    fn apply_slippage(&self, side: OrderSide, price: f64) -> f64 {
        if price <= 0.0 || self.slippage_pct <= 0.0 {
            return price;
        }
        price * (1.0 + side.adverse_sign() * self.slippage_pct)
    }
}
