pub mod account;
pub mod position;

pub use account::{Account, Balance, CoverOutcome};
pub use position::PositionState;
