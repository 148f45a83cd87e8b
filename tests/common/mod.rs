#![allow(dead_code)]

use barplay::config::ExchangeConfig;
use barplay::data::Bar;

pub fn config(start_usd: f64, fee: f64) -> ExchangeConfig {
    ExchangeConfig {
        symbol: "enj".to_string(),
        start_usd,
        fee,
        slippage_pct: 0.0,
        spread_pct: Some(0.0),
    }
}

pub fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(open, high, low, close).unwrap()
}

//four bars whose averages sit inside their own range
pub fn reference_bars() -> Vec<Bar> {
    vec![
        bar(100.0, 102.0, 98.0, 101.0),
        bar(101.0, 104.0, 100.0, 103.0),
        bar(103.0, 105.0, 101.0, 104.0),
        bar(104.0, 106.0, 100.0, 102.0),
    ]
}
