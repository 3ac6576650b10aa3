//! Settled positions and pending position deltas

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed18, FixedError, UFixed18};
use crate::oracle::OracleVersion;

/// Non-negative maker/taker magnitudes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub maker: UFixed18,
    pub taker: UFixed18,
}

/// Which side of the market a request touches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Maker,
    Taker,
}

/// The four position-changing requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    OpenMake,
    OpenTake,
    CloseMake,
    CloseTake,
}

impl TradeKind {
    pub fn side(self) -> Side {
        match self {
            TradeKind::OpenMake | TradeKind::CloseMake => Side::Maker,
            TradeKind::OpenTake | TradeKind::CloseTake => Side::Taker,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, TradeKind::OpenMake | TradeKind::OpenTake)
    }
}

impl Position {
    pub const ZERO: Position = Position {
        maker: UFixed18::ZERO,
        taker: UFixed18::ZERO,
    };

    pub fn new(maker: UFixed18, taker: UFixed18) -> Self {
        Position { maker, taker }
    }

    pub fn is_empty(&self) -> bool {
        self.maker.is_zero() && self.taker.is_zero()
    }

    pub fn get(&self, side: Side) -> UFixed18 {
        match side {
            Side::Maker => self.maker,
            Side::Taker => self.taker,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut UFixed18 {
        match side {
            Side::Maker => &mut self.maker,
            Side::Taker => &mut self.taker,
        }
    }

    pub fn checked_add(&self, other: &Position) -> Result<Position, FixedError> {
        Ok(Position {
            maker: self.maker.checked_add(other.maker)?,
            taker: self.taker.checked_add(other.taker)?,
        })
    }

    pub fn checked_sub(&self, other: &Position) -> Result<Position, FixedError> {
        Ok(Position {
            maker: self.maker.checked_sub(other.maker)?,
            taker: self.taker.checked_sub(other.taker)?,
        })
    }

    /// The larger side. Accounts are single-sided, so this is the size of
    /// whichever side they hold.
    pub fn max(&self) -> UFixed18 {
        self.maker.max(self.taker)
    }

    /// Position as if `pre` were realized right now.
    pub fn next(&self, pre: &PrePosition) -> Result<Position, FixedError> {
        self.checked_add(&pre.open_position)?
            .checked_sub(&pre.close_position)
    }

    /// Realize `pre` if `to` is strictly newer than the version the pre was
    /// requested at; otherwise leave the position untouched.
    ///
    /// Returns the resulting position and whether the pre settled. An empty
    /// pre settles as a no-op once `to` is newer.
    pub fn settled(&self, pre: &PrePosition, to: &OracleVersion) -> Result<(Position, bool), FixedError> {
        if pre.can_settle(to) {
            Ok((self.next(pre)?, true))
        } else {
            Ok((*self, false))
        }
    }

    /// `taker / maker`: 0 with no takers, 1 with takers but no makers.
    pub fn utilization(&self) -> Result<UFixed18, FixedError> {
        if self.taker.is_zero() {
            return Ok(UFixed18::ZERO);
        }
        if self.maker.is_zero() {
            return Ok(UFixed18::ONE);
        }
        UFixed18::ratio(self.taker, self.maker)
    }

    /// Fraction of taker exposure backed by makers, `min(1, maker / taker)`.
    pub fn socialization_factor(&self) -> Result<UFixed18, FixedError> {
        if self.taker.is_zero() {
            return Ok(UFixed18::ONE);
        }
        Ok(UFixed18::ratio(self.maker, self.taker)?.min(UFixed18::ONE))
    }
}

/// Position changes requested at an oracle version that has not yet been
/// superseded. Requests made at the same version are summed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrePosition {
    pub open_position: Position,
    pub close_position: Position,
    pub oracle_version: u64,
}

impl PrePosition {
    pub fn is_empty(&self) -> bool {
        self.open_position.is_empty() && self.close_position.is_empty()
    }

    /// Admission rule: a pre waits for at least one newer oracle version.
    pub fn can_settle(&self, to: &OracleVersion) -> bool {
        to.version > self.oracle_version
    }

    /// Merge a request into the pending delta.
    pub fn apply(&mut self, kind: TradeKind, version: u64, amount: UFixed18) -> Result<(), FixedError> {
        let target = if kind.is_open() {
            &mut self.open_position
        } else {
            &mut self.close_position
        };
        let slot = target.get_mut(kind.side());
        *slot = slot.checked_add(amount)?;
        self.oracle_version = version;
        Ok(())
    }

    /// Position fee charged when this pre is realized at `price`.
    pub fn compute_fee(
        &self,
        maker_fee: UFixed18,
        taker_fee: UFixed18,
        price: Fixed18,
    ) -> Result<UFixed18, FixedError> {
        let price = price.abs();
        let maker = self.open_position.maker.checked_add(self.close_position.maker)?;
        let taker = self.open_position.taker.checked_add(self.close_position.taker)?;
        maker
            .checked_mul(price)?
            .checked_mul(maker_fee)?
            .checked_add(taker.checked_mul(price)?.checked_mul(taker_fee)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> UFixed18 {
        s.parse().unwrap()
    }

    fn version(v: u64) -> OracleVersion {
        OracleVersion { version: v, timestamp: v * 10, price: Fixed18::from_int(100) }
    }

    #[test]
    fn test_settled_waits_for_newer_version() {
        let mut pre = PrePosition::default();
        pre.apply(TradeKind::OpenMake, 5, u("1")).unwrap();

        let start = Position::ZERO;
        assert_eq!(start.settled(&pre, &version(4)).unwrap(), (start, false));
        assert_eq!(start.settled(&pre, &version(5)).unwrap(), (start, false));
        assert_eq!(
            start.settled(&pre, &version(6)).unwrap(),
            (Position::new(u("1"), UFixed18::ZERO), true)
        );
    }

    #[test]
    fn test_empty_pre_settles_as_noop() {
        let start = Position::new(u("2"), UFixed18::ZERO);
        let pre = PrePosition::default();
        assert_eq!(start.settled(&pre, &version(0)).unwrap(), (start, false));
        assert_eq!(start.settled(&pre, &version(1)).unwrap(), (start, true));
    }

    #[test]
    fn test_requests_at_same_version_merge() {
        let mut pre = PrePosition::default();
        pre.apply(TradeKind::OpenTake, 3, u("0.5")).unwrap();
        pre.apply(TradeKind::OpenTake, 3, u("0.25")).unwrap();
        pre.apply(TradeKind::CloseTake, 3, u("0.1")).unwrap();

        assert_eq!(pre.open_position.taker, u("0.75"));
        assert_eq!(pre.close_position.taker, u("0.1"));
        assert_eq!(Position::ZERO.next(&pre).unwrap().taker, u("0.65"));
    }

    #[test]
    fn test_next_rejects_over_close() {
        let mut pre = PrePosition::default();
        pre.apply(TradeKind::CloseMake, 1, u("1")).unwrap();
        assert_eq!(Position::ZERO.next(&pre), Err(FixedError::Underflow));
    }

    #[test]
    fn test_utilization_and_socialization() {
        let p = Position::new(u("2"), u("1"));
        assert_eq!(p.utilization().unwrap(), u("0.5"));
        assert_eq!(p.socialization_factor().unwrap(), UFixed18::ONE);

        let thin = Position::new(u("1"), u("4"));
        assert_eq!(thin.utilization().unwrap(), u("4"));
        assert_eq!(thin.socialization_factor().unwrap(), u("0.25"));

        let no_makers = Position::new(UFixed18::ZERO, u("1"));
        assert_eq!(no_makers.utilization().unwrap(), UFixed18::ONE);
        assert_eq!(no_makers.socialization_factor().unwrap(), UFixed18::ZERO);

        assert_eq!(Position::ZERO.utilization().unwrap(), UFixed18::ZERO);
        assert_eq!(Position::ZERO.socialization_factor().unwrap(), UFixed18::ONE);
    }

    #[test]
    fn test_compute_fee() {
        let mut pre = PrePosition::default();
        pre.apply(TradeKind::OpenMake, 1, u("2")).unwrap();
        pre.apply(TradeKind::CloseTake, 1, u("1")).unwrap();

        let fee = pre
            .compute_fee(u("0.001"), u("0.002"), Fixed18::from_int(-1000))
            .unwrap();
        // 2 * 1000 * 0.001 + 1 * 1000 * 0.002
        assert_eq!(fee, u("4"));
    }
}
