//! Per-share value accumulators
//!
//! Each oracle version stores an absolute cumulative value rather than a
//! delta, so the value owed between any two versions is a single
//! subtraction no matter how many versions were skipped in between.

use serde::{Deserialize, Serialize};

use crate::curve::SECONDS_PER_YEAR;
use crate::fixed::{Fixed18, FixedError, UFixed18};
use crate::oracle::OracleVersion;
use crate::params::MarketParams;
use crate::position::Position;

/// Signed cumulative value per unit of position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    value: Fixed18,
}

impl Accumulator {
    pub const fn new(value: Fixed18) -> Self {
        Accumulator { value }
    }

    pub fn value(&self) -> Fixed18 {
        self.value
    }

    /// `value += amount / total`. Callers skip empty sides instead of
    /// passing a zero total.
    pub fn increment(&mut self, amount: Fixed18, total: UFixed18) -> Result<(), FixedError> {
        self.value = self.value.checked_add(amount.div_unsigned(total)?)?;
        Ok(())
    }

    pub fn decrement(&mut self, amount: Fixed18, total: UFixed18) -> Result<(), FixedError> {
        self.value = self.value.checked_sub(amount.div_unsigned(total)?)?;
        Ok(())
    }

    /// Value accrued since `from`.
    pub fn accumulated(&self, from: &Accumulator) -> Result<Fixed18, FixedError> {
        self.value.checked_sub(from.value)
    }
}

/// Unsigned cumulative value per unit of position. Only ever grows, and
/// saturates at `UFixed18::MAX` instead of failing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UAccumulator {
    value: UFixed18,
}

impl UAccumulator {
    pub const fn new(value: UFixed18) -> Self {
        UAccumulator { value }
    }

    pub fn value(&self) -> UFixed18 {
        self.value
    }

    /// `value += amount / total`, saturating. A zero total still fails.
    pub fn increment(&mut self, amount: UFixed18, total: UFixed18) -> Result<(), FixedError> {
        let per_unit = match amount.checked_div(total) {
            Err(FixedError::Overflow) => UFixed18::MAX,
            other => other?,
        };
        self.value = self.value.saturating_add(per_unit);
        Ok(())
    }

    pub fn accumulated(&self, from: &UAccumulator) -> Result<UFixed18, FixedError> {
        self.value.checked_sub(from.value)
    }

    /// `accumulated(from) * position`, saturating.
    fn weighted_since(&self, from: &UAccumulator, position: UFixed18) -> Result<UFixed18, FixedError> {
        Ok(self.accumulated(from)?.checked_mul(position).unwrap_or(UFixed18::MAX))
    }
}

/// Market-wide accumulators snapshotted at every settled version.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAccumulator {
    /// Collateral value per unit of maker position.
    pub value_maker: Accumulator,
    /// Collateral value per unit of taker position.
    pub value_taker: Accumulator,
    /// Position-weighted seconds per unit of maker position.
    pub share_maker: UAccumulator,
    /// Position-weighted seconds per unit of taker position.
    pub share_taker: UAccumulator,
}

/// Result of accruing one settlement step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Accrual {
    pub accumulator: MarketAccumulator,
    /// Portion of funding withheld from makers as a market fee.
    pub funding_fee: UFixed18,
}

impl MarketAccumulator {
    /// Accrue funding, position PnL and share from `from` to `to` for the
    /// global `position` that was in force during the interval.
    ///
    /// # Arguments
    /// * `params` - market parameters (curve, funding fee)
    /// * `position` - global settled position during the interval
    /// * `from` - version the interval starts at (payoff applied)
    /// * `to` - version the interval ends at (payoff applied)
    ///
    /// # Returns
    /// The accumulator at `to` and the funding fee collected over the step.
    pub fn accrue(
        &self,
        params: &MarketParams,
        position: &Position,
        from: &OracleVersion,
        to: &OracleVersion,
    ) -> Result<Accrual, FixedError> {
        assert!(
            to.timestamp >= from.timestamp,
            "oracle timestamp regressed: {} -> {}",
            from.timestamp,
            to.timestamp
        );
        let elapsed = UFixed18::from_int(to.timestamp - from.timestamp);
        let mut next = *self;
        let mut funding_fee = UFixed18::ZERO;

        if !position.maker.is_zero() && !position.taker.is_zero() {
            funding_fee = next.accrue_funding(params, position, from, elapsed)?;
            next.accrue_position(position, from, to)?;
        }
        if !position.maker.is_zero() {
            next.share_maker.increment(elapsed, position.maker)?;
        }
        if !position.taker.is_zero() {
            next.share_taker.increment(elapsed, position.taker)?;
        }

        Ok(Accrual {
            accumulator: next,
            funding_fee,
        })
    }

    /// Takers pay `rate * elapsed / YEAR` on their socialized notional; a
    /// negative rate reverses the flow. The funding fee is cut from the
    /// receiving side only.
    fn accrue_funding(
        &mut self,
        params: &MarketParams,
        position: &Position,
        from: &OracleVersion,
        elapsed: UFixed18,
    ) -> Result<UFixed18, FixedError> {
        let rate = params.utilization_curve.compute(position.utilization()?)?;
        let notional = position
            .taker
            .checked_mul(from.price.abs())?
            .checked_mul(position.socialization_factor()?)?;
        let funding = rate
            .mul_unsigned(notional)?
            .mul_div(elapsed.to_signed()?, UFixed18::from_int(SECONDS_PER_YEAR).to_signed()?)?;

        let fee = funding.abs().checked_mul(params.funding_fee)?;
        let net = Fixed18::with_sign(funding.is_negative(), funding.abs().checked_sub(fee)?)?;
        let (maker_funding, taker_funding) = if funding.is_negative() { (funding, net) } else { (net, funding) };

        self.value_maker.increment(maker_funding, position.maker)?;
        self.value_taker.decrement(taker_funding, position.taker)?;
        Ok(fee)
    }

    /// Price movement on the socialized taker notional flows from makers to
    /// takers.
    fn accrue_position(
        &mut self,
        position: &Position,
        from: &OracleVersion,
        to: &OracleVersion,
    ) -> Result<(), FixedError> {
        let delta = to
            .price
            .checked_sub(from.price)?
            .mul_unsigned(position.taker)?
            .mul_unsigned(position.socialization_factor()?)?;

        self.value_taker.increment(delta, position.taker)?;
        self.value_maker.decrement(delta, position.maker)?;
        Ok(())
    }

    /// Collateral owed to an account holding `position` since `from`.
    pub fn value_since(&self, from: &MarketAccumulator, position: &Position) -> Result<Fixed18, FixedError> {
        let maker = self.value_maker.accumulated(&from.value_maker)?.mul_unsigned(position.maker)?;
        let taker = self.value_taker.accumulated(&from.value_taker)?.mul_unsigned(position.taker)?;
        maker.checked_add(taker)
    }

    /// Incentive share earned by an account holding `position` since `from`.
    /// Saturates rather than failing settlement.
    pub fn share_since(&self, from: &MarketAccumulator, position: &Position) -> Result<UFixed18, FixedError> {
        let maker = self.share_maker.weighted_since(&from.share_maker, position.maker)?;
        let taker = self.share_taker.weighted_since(&from.share_taker, position.taker)?;
        Ok(maker.saturating_add(taker))
    }
}
