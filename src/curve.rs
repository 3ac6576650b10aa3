//! Jump-rate utilization curve
//!
//! Maps maker/taker utilization onto an annual funding rate by linear
//! interpolation through `(0, minimum_rate)`, `(target_utilization,
//! target_rate)` and `(1, maximum_rate)`. Utilization at or above 1 is
//! clamped to `maximum_rate`, never extrapolated.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::fixed::{Fixed18, FixedError, UFixed18};

/// Seconds per annum used to turn annual rates into per-period rates.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationCurve {
    pub minimum_rate: Fixed18,
    pub maximum_rate: Fixed18,
    pub target_rate: Fixed18,
    pub target_utilization: UFixed18,
}

impl UtilizationCurve {
    /// Target utilization must sit strictly inside (0, 1) so both
    /// segments have a non-zero width.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.target_utilization.is_zero() || self.target_utilization >= UFixed18::ONE {
            return Err(LedgerError::InvalidParams("utilization_curve.target_utilization"));
        }
        Ok(())
    }

    /// Annual rate at `utilization`.
    pub fn compute(&self, utilization: UFixed18) -> Result<Fixed18, FixedError> {
        if utilization < self.target_utilization {
            return linear(
                UFixed18::ZERO,
                self.minimum_rate,
                self.target_utilization,
                self.target_rate,
                utilization,
            );
        }
        if utilization < UFixed18::ONE {
            return linear(
                self.target_utilization,
                self.target_rate,
                UFixed18::ONE,
                self.maximum_rate,
                utilization,
            );
        }
        Ok(self.maximum_rate)
    }
}

/// y0 + (y1 - y0) * (x - x0) / (x1 - x0), rounded once.
fn linear(
    x0: UFixed18,
    y0: Fixed18,
    x1: UFixed18,
    y1: Fixed18,
    x: UFixed18,
) -> Result<Fixed18, FixedError> {
    let dy = y1.checked_sub(y0)?;
    let dx = x.checked_sub(x0)?.to_signed()?;
    let width = x1.checked_sub(x0)?.to_signed()?;
    y0.checked_add(dy.mul_div(dx, width)?)
}
