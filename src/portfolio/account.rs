use crate::portfolio::position::PositionState;
use serde::{Deserialize, Serialize};

//derived snapshot, computed on demand and never cached
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub usd: f64,
    pub position: f64,
    pub short_cash: f64,
    pub short_margin: f64,
    pub equity: f64,
    pub entry_price: f64,
    pub last_price: f64,
}

//outcome of buying back a short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOutcome {
    Covered,
    //reserved capital could not pay for the buy-back, everything was wiped
    Liquidated,
}

//cash and holdings of the single traded asset
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    usd: f64,

    //signed units, negative while short
    position: f64,

    //0 while flat
    entry_price: f64,

    //short sale proceeds held net of fee
    short_cash: f64,

    //capital reserved to cover the short
    short_margin: f64,
}

impl Account {
    //negative starting balances are clamped to 0
    pub fn new(start_usd: f64) -> Self {
        Account {
            usd: start_usd.max(0.0),
            position: 0.0,
            entry_price: 0.0,
            short_cash: 0.0,
            short_margin: 0.0,
        }
    }

    pub fn usd(&self) -> f64 {
        self.usd
    }

    pub fn position(&self) -> PositionState {
        PositionState::from_signed(self.position)
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    //position is valued at last_price, or the entry price before any price is seen
    pub fn balance(&self, last_price: f64) -> Balance {
        let price = if last_price > 0.0 {
            last_price
        } else {
            self.entry_price
        };

        let mut equity = self.usd + self.short_cash + self.short_margin;
        if price > 0.0 {
            equity += self.position * price;
        }

        Balance {
            usd: self.usd,
            position: self.position,
            short_cash: self.short_cash,
            short_margin: self.short_margin,
            equity,
            entry_price: self.entry_price,
            last_price,
        }
    }

    //debits the full notional, holds qty units
    pub fn open_long(&mut self, notional: f64, qty: f64, exec_price: f64) {
        self.usd -= notional;
        self.position = qty;
        self.entry_price = exec_price;
    }

    //debits the notional, reserves it as margin and holds the proceeds net of fee
    pub fn open_short(&mut self, notional: f64, net: f64, qty: f64, exec_price: f64) {
        self.usd -= notional;
        self.short_margin += notional;
        self.short_cash += net;
        self.position = -qty;
        self.entry_price = exec_price;
    }

    pub fn close_long(&mut self, revenue: f64, fee: f64) {
        self.usd += revenue - fee;
        self.flatten();
    }

    //pays total from short cash first, then margin, and sweeps the rest into usd
    pub fn cover_short(&mut self, total: f64) -> CoverOutcome {
        if self.short_cash + self.short_margin < total {
            self.liquidate();
            return CoverOutcome::Liquidated;
        }

        if total <= self.short_cash {
            self.short_cash -= total;
        } else {
            let remainder = total - self.short_cash;
            self.short_cash = 0.0;
            self.short_margin = (self.short_margin - remainder).max(0.0);
        }

        self.flatten();
        self.usd += self.short_cash + self.short_margin;
        self.short_cash = 0.0;
        self.short_margin = 0.0;
        CoverOutcome::Covered
    }

    fn liquidate(&mut self) {
        self.usd = 0.0;
        self.short_cash = 0.0;
        self.short_margin = 0.0;
        self.flatten();
    }

    fn flatten(&mut self) {
        self.position = 0.0;
        self.entry_price = 0.0;
    }
}
