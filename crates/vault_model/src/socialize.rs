//! Per-side loss clamping and socialization
//!
//! A vault backs one maker position in a long market and one in a short
//! market. Each side's accumulated PnL is bounded below by the assets
//! deployed to that side: a side can lose everything it holds, never more.
//! Whatever the clamp removes is unbacked loss that the markets absorb as
//! shortfall.
//!
//! ## Key Properties
//!
//! - **Bounded sides**: `side_accumulated >= -side_assets`
//! - **Non-negative total**: reported vault assets floor at zero
//! - **Conservative**: gains pass through unchanged

use serde::{Deserialize, Serialize};

use perpetual_ledger::{Fixed18, FixedError, UFixed18};

use crate::context::VersionContext;

/// Outcome of socializing one checkpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocializationOutcome {
    /// Long-side PnL after clamping at `-long_assets`
    pub long_accumulated: Fixed18,

    /// Short-side PnL after clamping at `-short_assets`
    pub short_accumulated: Fixed18,

    /// Vault assets after PnL, floored at zero
    pub total_assets: UFixed18,

    /// Loss the vault could not back (clamped away on either side, plus
    /// any remainder below zero)
    pub socialized_loss: UFixed18,
}

/// Apply accumulated PnL to a checkpoint with per-side clamping.
///
/// # Arguments
/// * `ctx` - checkpoint the PnL accrued against
/// * `long_accumulated` - PnL of the long-market maker position
/// * `short_accumulated` - PnL of the short-market maker position
///
/// # Returns
/// `SocializationOutcome` with clamped per-side PnL and resulting assets
///
/// # Guarantees
/// - `total_assets` is never negative
/// - each clamped side is `>= -side_assets`
///
/// # Example
/// ```
/// use perpetual_ledger::{Fixed18, UFixed18};
/// use vault_model::{socialize, VersionContext};
///
/// let ctx = VersionContext {
///     long_assets: UFixed18::from_int(100),
///     short_assets: UFixed18::from_int(100),
///     total_assets: UFixed18::from_int(200),
///     ..VersionContext::default()
/// };
/// let outcome = socialize(&ctx, Fixed18::from_int(-150), Fixed18::from_int(20)).unwrap();
/// assert_eq!(outcome.long_accumulated, Fixed18::from_int(-100));
/// assert_eq!(outcome.total_assets, UFixed18::from_int(120));
/// assert_eq!(outcome.socialized_loss, UFixed18::from_int(50));
/// ```
pub fn socialize(
    ctx: &VersionContext,
    long_accumulated: Fixed18,
    short_accumulated: Fixed18,
) -> Result<SocializationOutcome, FixedError> {
    let long = clamp_loss(long_accumulated, ctx.long_assets)?;
    let short = clamp_loss(short_accumulated, ctx.short_assets)?;

    let clamped_away = long
        .checked_sub(long_accumulated)?
        .checked_add(short.checked_sub(short_accumulated)?)?
        .abs();

    let net = ctx.total_assets.to_signed()?.checked_add(long)?.checked_add(short)?;
    let (total_assets, below_zero) = if net.is_negative() {
        (UFixed18::ZERO, net.abs())
    } else {
        (net.abs(), UFixed18::ZERO)
    };

    Ok(SocializationOutcome {
        long_accumulated: long,
        short_accumulated: short,
        total_assets,
        socialized_loss: clamped_away.checked_add(below_zero)?,
    })
}

/// `max(accumulated, -assets)`
fn clamp_loss(accumulated: Fixed18, assets: UFixed18) -> Result<Fixed18, FixedError> {
    let floor = Fixed18::with_sign(true, assets)?;
    Ok(accumulated.max(floor))
}
