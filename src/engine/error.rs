use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("symbol mismatch: exchange trades {expected}, bar is tagged {found}")]
    SymbolMismatch { expected: String, found: String },
    #[error("price not set")]
    PriceNotSet,
    #[error("position already open")]
    PositionOpen,
    #[error("no open position")]
    NoPosition,
    #[error("fraction must be in (0, 1]")]
    InvalidFraction,
    #[error("close must be a positive finite price, got {0}")]
    NonPositiveClose(f64),
    #[error("bars are empty")]
    EmptyBars,
    #[error("no more bars")]
    NoMoreBars,
}

impl EngineError {
    //end of replay, not an operational failure
    pub fn is_exhausted(&self) -> bool {
        matches!(self, EngineError::NoMoreBars)
    }
}
