//! Maintenance requirement
//!
//! `maintenance = position.max() * |price| * ratio`. The absolute price is
//! used so short payoffs (negative prices) carry a positive requirement.

use crate::fixed::{Fixed18, FixedError, UFixed18};
use crate::position::{Position, PrePosition};

pub fn maintenance(position: &Position, price: Fixed18, ratio: UFixed18) -> Result<UFixed18, FixedError> {
    position.max().checked_mul(price.abs())?.checked_mul(ratio)
}

/// Requirement once `pre` is realized.
pub fn maintenance_next(
    position: &Position,
    pre: &PrePosition,
    price: Fixed18,
    ratio: UFixed18,
) -> Result<UFixed18, FixedError> {
    maintenance(&position.next(pre)?, price, ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::TradeKind;

    #[test]
    fn test_maintenance_uses_larger_side() {
        let position = Position::new(UFixed18::ZERO, UFixed18::from_int(2));
        let m = maintenance(&position, Fixed18::from_int(1000), "0.3".parse().unwrap()).unwrap();
        assert_eq!(m, UFixed18::from_int(600));

        let short = maintenance(&position, Fixed18::from_int(-1000), "0.3".parse().unwrap()).unwrap();
        assert_eq!(short, m);
    }

    #[test]
    fn test_maintenance_next_includes_pre() {
        let position = Position::new(UFixed18::ZERO, UFixed18::from_int(2));
        let mut pre = PrePosition::default();
        pre.apply(TradeKind::CloseTake, 0, UFixed18::ONE).unwrap();
        let m = maintenance_next(&position, &pre, Fixed18::from_int(1000), "0.3".parse().unwrap()).unwrap();
        assert_eq!(m, UFixed18::from_int(300));
    }
}
