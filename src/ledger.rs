//! Position settlement and accounting engine for perpetual markets
//!
//! Tracks per-account and global position deltas across discrete oracle
//! versions, settles pending deltas lazily, accumulates funding and PnL per
//! unit of position, and enforces collateral maintenance.
//!
//! The main entry point is [`Market`]: a single-writer ledger wired to an
//! [`OracleProvider`] and a [`RewardSink`].

pub mod account;
pub mod accumulator;
pub mod collateral;
pub mod curve;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod maintenance;
pub mod oracle;
pub mod params;
pub mod payoff;
pub mod position;
pub mod rewards;
pub mod store;
pub mod versioned;

pub use account::{AccountId, AccountPosition};
pub use accumulator::{Accumulator, MarketAccumulator, UAccumulator};
pub use curve::{UtilizationCurve, SECONDS_PER_YEAR};
pub use engine::{settlement_steps, AccountSettlement, Market, Settlement, SettlementStep};
pub use error::LedgerError;
pub use fixed::{Fixed, Fixed18, Fixed6, FixedError, Rounding, UFixed, UFixed18, UFixed6};
pub use oracle::{MemoryOracle, OracleError, OracleProvider, OracleVersion};
pub use params::MarketParams;
pub use payoff::{Payoff, PayoffDirection, PayoffKind};
pub use position::{Position, PrePosition, Side, TradeKind};
pub use rewards::{NoRewards, RewardError, RewardFailurePolicy, RewardSink};
pub use store::{FeeLedger, LedgerStore};
pub use versioned::Versioned;

#[cfg(test)]
mod tests;
