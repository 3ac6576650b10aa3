//! Payoff transform applied to raw oracle prices
//!
//! Every oracle version is passed through the market's payoff before any
//! accrual, fee or maintenance computation sees it.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed18, FixedError};
use crate::oracle::OracleVersion;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoffDirection {
    #[default]
    Long,
    Short,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoffKind {
    #[default]
    Passthrough,
    Squared,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payoff {
    #[serde(default)]
    pub direction: PayoffDirection,
    #[serde(default)]
    pub kind: PayoffKind,
}

impl Payoff {
    pub const LONG: Payoff = Payoff {
        direction: PayoffDirection::Long,
        kind: PayoffKind::Passthrough,
    };

    pub const SHORT: Payoff = Payoff {
        direction: PayoffDirection::Short,
        kind: PayoffKind::Passthrough,
    };

    pub fn price(&self, raw: Fixed18) -> Result<Fixed18, FixedError> {
        let price = match self.kind {
            PayoffKind::Passthrough => raw,
            PayoffKind::Squared => raw.checked_mul(raw)?,
        };
        match self.direction {
            PayoffDirection::Long => Ok(price),
            PayoffDirection::Short => price.checked_neg(),
        }
    }

    pub fn transform(&self, version: OracleVersion) -> Result<OracleVersion, FixedError> {
        Ok(OracleVersion {
            price: self.price(version.price)?,
            ..version
        })
    }
}
