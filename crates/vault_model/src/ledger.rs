//! Versioned vault checkpoints and historical share conversion
//!
//! ## Architecture
//!
//! ```text
//! Checkpoint (version v):
//! 1. Record positions, deployed assets, total assets and shares
//!
//! Conversion at version v:
//! 1. Find the checkpoint at or before v
//! 2. Read maker PnL for (checkpoint, checkpoint + 1) from each market
//! 3. Clamp each side, floor the total at zero
//! 4. Convert with the socialized total assets
//! ```

use thiserror::Error;

use perpetual_ledger::{FixedError, UFixed18, Versioned};

use crate::context::VersionContext;
use crate::socialize::{socialize, SocializationOutcome};
use crate::source::ValueSource;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("no vault checkpoint at or before version {0}")]
    NoCheckpoint(u64),
    #[error(transparent)]
    Arithmetic(#[from] FixedError),
}

#[derive(Clone, Debug, Default)]
pub struct VaultLedger {
    contexts: Versioned<VersionContext>,
}

impl VaultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a checkpoint. Checkpoints must arrive in version order.
    pub fn record(&mut self, ctx: VersionContext) {
        self.contexts.record(ctx.version, ctx);
    }

    pub fn context_at(&self, version: u64) -> Option<&VersionContext> {
        self.contexts.at(version)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Socialized state of the checkpoint in force at `version`.
    ///
    /// # Arguments
    /// * `version` - oracle version to evaluate at
    /// * `long` - long market the vault makes in
    /// * `short` - short market the vault makes in
    pub fn socialized_at<L: ValueSource, S: ValueSource>(
        &self,
        version: u64,
        long: &L,
        short: &S,
    ) -> Result<(VersionContext, SocializationOutcome), VaultError> {
        let ctx = *self.context_at(version).ok_or(VaultError::NoCheckpoint(version))?;
        let outcome = socialize(
            &ctx,
            long.accumulated(ctx.version, ctx.long_position)?,
            short.accumulated(ctx.version, ctx.short_position)?,
        )?;
        Ok((ctx, outcome))
    }

    pub fn total_assets_at<L: ValueSource, S: ValueSource>(
        &self,
        version: u64,
        long: &L,
        short: &S,
    ) -> Result<UFixed18, VaultError> {
        Ok(self.socialized_at(version, long, short)?.1.total_assets)
    }

    /// Shares minted for `assets` at `version`. 1:1 while the vault holds
    /// no shares or no assets.
    pub fn convert_to_shares_at<L: ValueSource, S: ValueSource>(
        &self,
        assets: UFixed18,
        version: u64,
        long: &L,
        short: &S,
    ) -> Result<UFixed18, VaultError> {
        let (ctx, outcome) = self.socialized_at(version, long, short)?;
        if ctx.is_empty() || outcome.total_assets.is_zero() {
            return Ok(assets);
        }
        Ok(assets.mul_div(ctx.total_shares, outcome.total_assets)?)
    }

    /// Assets redeemed for `shares` at `version`.
    pub fn convert_to_assets_at<L: ValueSource, S: ValueSource>(
        &self,
        shares: UFixed18,
        version: u64,
        long: &L,
        short: &S,
    ) -> Result<UFixed18, VaultError> {
        let (ctx, outcome) = self.socialized_at(version, long, short)?;
        if ctx.is_empty() {
            return Ok(shares);
        }
        Ok(shares.mul_div(outcome.total_assets, ctx.total_shares)?)
    }
}
