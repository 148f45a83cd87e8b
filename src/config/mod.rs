pub mod backtest_config;

pub use backtest_config::{DataSource, ExchangeConfig, RunConfiguration, SmaParams};
