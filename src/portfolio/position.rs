use serde::{Deserialize, Serialize};

//exactly one of flat, long or short holds at any time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositionState {
    Flat,
    //units held
    Long(f64),
    //units owed, always positive
    Short(f64),
}

impl PositionState {
    //from a signed quantity (positive for long, negative for short, 0 for flat)
    pub fn from_signed(qty: f64) -> Self {
        if qty > 0.0 {
            PositionState::Long(qty)
        } else if qty < 0.0 {
            PositionState::Short(-qty)
        } else {
            PositionState::Flat
        }
    }

    pub fn signed_qty(&self) -> f64 {
        match *self {
            PositionState::Flat => 0.0,
            PositionState::Long(qty) => qty,
            PositionState::Short(qty) => -qty,
        }
    }

    //returns true if the position is flat (no open position)
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }

    pub fn is_short(&self) -> bool {
        matches!(self, PositionState::Short(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_round_trip() {
        assert_eq!(PositionState::from_signed(2.5), PositionState::Long(2.5));
        assert_eq!(PositionState::from_signed(-3.0), PositionState::Short(3.0));
        assert!(PositionState::from_signed(0.0).is_flat());
        assert_eq!(PositionState::Short(3.0).signed_qty(), -3.0);
    }
}
