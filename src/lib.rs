//a bar-replay exchange emulator with a strategy backtesting driver

pub mod config;
pub mod data;
pub mod engine;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DataSource, ExchangeConfig, RunConfiguration, SmaParams};
    pub use crate::data::{
        filter_by_symbol, load_csv, load_csv_filtered, load_data_root, Bar, BarError, BarFilter,
        Interval,
    };
    pub use crate::engine::{
        BacktestEngine, BacktestResult, Emulator, EngineError, Exchange, LimitDiagnostics,
        LimitMiss, Order, OrderSide, PendingKind, PriceModel, SpreadMode,
    };
    pub use crate::metrics::{calculate_equity_curve, EquityPoint, EquitySample, SummaryMetrics};
    pub use crate::portfolio::{Account, Balance, PositionState};
    pub use crate::strategy::{sma_crossover::SmaCrossoverStrategy, Strategy, StrategyContext};
}
