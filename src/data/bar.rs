use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BarError {
    #[error("Invalid OHLC values: {field} is not finite ({value})")]
    NotFinite { field: &'static str, value: f64 },
    #[error("Invalid OHLC values: negative {field} ({value})")]
    Negative { field: &'static str, value: f64 },
    #[error("Invalid OHLC values: high ({high}) < low ({low})")]
    InvalidHighLow { high: f64, low: f64 },
    #[error("Invalid OHLC values: close must be positive, got {0}")]
    NonPositiveClose(f64),
}

//one ohlc observation plus the derived average used as the order-placement reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub average: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl Bar {
    //creates a new Bar with validation, average is (o+h+l+c)/4
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Result<Self, BarError> {
        for (field, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !value.is_finite() {
                return Err(BarError::NotFinite { field, value });
            }
            if value < 0.0 {
                return Err(BarError::Negative { field, value });
            }
        }

        if high < low {
            return Err(BarError::InvalidHighLow { high, low });
        }

        if !(close > 0.0) {
            return Err(BarError::NonPositiveClose(close));
        }

        Ok(Self::new_unchecked(open, high, low, close))
    }

    //creates a Bar without validation
    pub fn new_unchecked(open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            open,
            high,
            low,
            close,
            average: (open + high + low + close) / 4.0,
            timestamp: None,
            symbol: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    //returns the range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    //true when price was touched inside the bar, tolerates swapped high/low
    pub fn contains(&self, price: f64) -> bool {
        if price <= 0.0 || self.low <= 0.0 || self.high <= 0.0 {
            return false;
        }
        let (low, high) = if self.low > self.high {
            (self.high, self.low)
        } else {
            (self.low, self.high)
        };
        price >= low && price <= high
    }
}
