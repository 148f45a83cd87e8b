pub mod backtest;
pub mod emulator;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod pending;

pub use backtest::{BacktestEngine, BacktestResult};
pub use emulator::Emulator;
pub use error::EngineError;
pub use exchange::Exchange;
pub use execution::{
    Order, OrderSide, PriceModel, SpreadMode, REASON_ENTRY_LONG, REASON_ENTRY_SHORT, REASON_EXIT,
    REASON_LIQUIDATION, REASON_STOP_LOSS,
};
pub use pending::{LimitDiagnostics, LimitMiss, PendingKind, PendingOrder};
