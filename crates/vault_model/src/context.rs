//! Per-version vault checkpoints

use serde::{Deserialize, Serialize};

use perpetual_ledger::UFixed18;

/// Snapshot of a vault's positions, assets and shares at an oracle version.
///
/// Checkpoints let share price be computed at any historical version
/// without replaying every version since inception.
///
/// # Invariants
/// - `long_assets + short_assets <= total_assets`
/// - all fields are non-negative by construction
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionContext {
    /// Oracle version this checkpoint was taken at
    pub version: u64,

    /// Maker position held in the long market
    pub long_position: UFixed18,

    /// Maker position held in the short market
    pub short_position: UFixed18,

    /// Collateral deployed to the long market
    pub long_assets: UFixed18,

    /// Collateral deployed to the short market
    pub short_assets: UFixed18,

    /// All vault assets, including those not deployed to either market
    pub total_assets: UFixed18,

    /// Outstanding vault shares
    pub total_shares: UFixed18,
}

impl VersionContext {
    /// Assets held by the vault but not deployed to either market.
    pub fn idle_assets(&self) -> UFixed18 {
        self.total_assets
            .saturating_sub(self.long_assets)
            .saturating_sub(self.short_assets)
    }

    pub fn is_empty(&self) -> bool {
        self.total_shares.is_zero()
    }
}
