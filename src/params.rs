//! Market configuration
//!
//! Read-only to the engine. Values deserialize from decimal strings so a
//! TOML table such as
//!
//! ```toml
//! maintenance = "0.30"
//! funding_fee = "0.10"
//! maker_fee = "0.0"
//! taker_fee = "0.0"
//! maker_limit = "1000"
//!
//! [utilization_curve]
//! minimum_rate = "0.00"
//! maximum_rate = "1.00"
//! target_rate = "0.10"
//! target_utilization = "0.80"
//! ```
//!
//! parses exactly into fixed point.

use serde::{Deserialize, Serialize};

use crate::curve::UtilizationCurve;
use crate::error::LedgerError;
use crate::fixed::UFixed18;
use crate::payoff::Payoff;
use crate::rewards::RewardFailurePolicy;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Maintenance requirement as a fraction of notional.
    pub maintenance: UFixed18,
    /// Share of funding kept by the market instead of paid to makers.
    pub funding_fee: UFixed18,
    /// Position fee on maker opens/closes, fraction of notional.
    pub maker_fee: UFixed18,
    /// Position fee on taker opens/closes, fraction of notional.
    pub taker_fee: UFixed18,
    /// Upper bound on total maker position.
    pub maker_limit: UFixed18,
    /// Share of collected fees routed to the protocol bucket.
    #[serde(default)]
    pub protocol_fee: UFixed18,
    /// Fraction of maintenance paid to a liquidator.
    #[serde(default)]
    pub liquidation_fee: UFixed18,
    /// Smallest non-zero collateral balance an account may leave behind, and
    /// the least an account must hold to open a position.
    #[serde(default)]
    pub min_collateral: UFixed18,
    /// Smallest non-zero position an account may hold on a side.
    #[serde(default = "default_min_position")]
    pub min_position: UFixed18,
    pub utilization_curve: UtilizationCurve,
    #[serde(default)]
    pub payoff: Payoff,
    #[serde(default)]
    pub reward_failure: RewardFailurePolicy,
}

fn default_min_position() -> UFixed18 {
    UFixed18::from_raw(UFixed18::SCALE / 1_000_000)
}

impl MarketParams {
    pub fn validate(&self) -> Result<(), LedgerError> {
        let ratios = [
            ("maintenance", self.maintenance),
            ("funding_fee", self.funding_fee),
            ("maker_fee", self.maker_fee),
            ("taker_fee", self.taker_fee),
            ("protocol_fee", self.protocol_fee),
            ("liquidation_fee", self.liquidation_fee),
        ];
        if let Some((name, _)) = ratios.iter().find(|(_, v)| *v > UFixed18::ONE) {
            return Err(LedgerError::InvalidParams(name));
        }
        if self.maker_limit.is_zero() {
            return Err(LedgerError::InvalidParams("maker_limit"));
        }
        self.utilization_curve.validate()
    }
}
