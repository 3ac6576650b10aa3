//! Per-account position ledger entries

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::fixed::FixedError;
use crate::position::{Position, PrePosition, Side};

/// Opaque account identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Settled position, pending delta and liquidation flag of one account.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub position: Position,
    pub pre: PrePosition,
    /// Set by liquidation; cleared once the closing pre settles.
    pub liquidation: bool,
    /// Oracle version the account was last settled at.
    pub latest_version: u64,
}

impl AccountPosition {
    pub fn new(version: u64) -> Self {
        AccountPosition {
            latest_version: version,
            ..Default::default()
        }
    }

    /// Position once the pending delta is realized.
    pub fn next(&self) -> Result<Position, FixedError> {
        self.position.next(&self.pre)
    }

    /// Whether both sides are touched by the settled position or the pre.
    pub fn is_double_sided(&self) -> bool {
        let touches = |side: Side| {
            !self.position.get(side).is_zero()
                || !self.pre.open_position.get(side).is_zero()
                || !self.pre.close_position.get(side).is_zero()
        };
        touches(Side::Maker) && touches(Side::Taker)
    }

    /// Whether any side closes more than it holds plus what it opens.
    pub fn is_over_closed(&self) -> Result<bool, FixedError> {
        for side in [Side::Maker, Side::Taker] {
            let available = self.position.get(side).checked_add(self.pre.open_position.get(side))?;
            if self.pre.close_position.get(side) > available {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.is_over_closed()? {
            return Err(LedgerError::OverClosed);
        }
        if self.is_double_sided() {
            return Err(LedgerError::DoubleSided);
        }
        Ok(())
    }
}
