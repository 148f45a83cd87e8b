pub mod summary;
pub mod timeseries;

pub use summary::{round_trip_pnls, SummaryMetrics};
pub use timeseries::{calculate_equity_curve, EquityPoint, EquitySample};
