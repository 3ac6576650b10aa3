//! Ledger error taxonomy
//!
//! Validation failures and external-dependency failures are returned as
//! [`LedgerError`] before any state is committed. Broken internal invariants
//! (oracle versions moving backward relative to the ledger, out-of-order
//! versioned writes) panic instead.

use thiserror::Error;

use crate::account::AccountId;
use crate::fixed::{FixedError, UFixed18};
use crate::oracle::OracleError;
use crate::rewards::RewardError;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Arithmetic(#[from] FixedError),

    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("reward sink: {0}")]
    Reward(#[from] RewardError),

    #[error("invalid market parameter `{0}`")]
    InvalidParams(&'static str),

    #[error("request amount must be non-zero")]
    ZeroAmount,

    #[error("close exceeds open position")]
    OverClosed,

    #[error("account cannot hold maker and taker positions at once")]
    DoubleSided,

    #[error("collateral {available} below required {required}")]
    InsufficientCollateral { required: UFixed18, available: UFixed18 },

    #[error("collateral {remaining} below minimum {minimum}")]
    CollateralBelowMinimum { remaining: UFixed18, minimum: UFixed18 },

    #[error("position {position} below minimum {minimum}")]
    PositionBelowMinimum { position: UFixed18, minimum: UFixed18 },

    #[error("maker position {next} exceeds limit {limit}")]
    MakerOverLimit { next: UFixed18, limit: UFixed18 },

    #[error("insufficient maker liquidity (socialization factor {0})")]
    InsufficientLiquidity(UFixed18),

    #[error("account {0} is being liquidated")]
    InLiquidation(AccountId),

    #[error("account {0} is not liquidatable")]
    NotLiquidatable(AccountId),

    #[error("account cannot liquidate itself")]
    SelfLiquidation,
}
