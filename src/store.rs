//! Ledger state owned by a single market
//!
//! The store holds no behaviour beyond lookups; every mutation goes through
//! a staged transition committed by the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::accumulator::MarketAccumulator;
use crate::account::{AccountId, AccountPosition};
use crate::collateral::CollateralLedger;
use crate::fixed::{FixedError, UFixed18};
use crate::position::{Position, PrePosition};
use crate::versioned::Versioned;

/// Global position timeline plus the single pending global delta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedPosition {
    pub latest_version: u64,
    pub pre: PrePosition,
    pub positions: Versioned<Position>,
}

impl VersionedPosition {
    pub fn new(version: u64) -> Self {
        let mut positions = Versioned::new();
        positions.record(version, Position::ZERO);
        VersionedPosition {
            latest_version: version,
            pre: PrePosition::default(),
            positions,
        }
    }

    /// Settled global position at the latest version.
    pub fn position(&self) -> Position {
        self.position_at_version(self.latest_version)
    }

    pub fn position_at_version(&self, version: u64) -> Position {
        self.positions.at(version).copied().unwrap_or_default()
    }
}

/// Collected fees, split between protocol and market.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLedger {
    pub protocol: UFixed18,
    pub market: UFixed18,
}

impl FeeLedger {
    pub fn total(&self) -> Result<UFixed18, FixedError> {
        self.protocol.checked_add(self.market)
    }

    /// Route `amount` into the buckets, `protocol_fee` of it to protocol.
    pub fn collect(&mut self, amount: UFixed18, protocol_fee: UFixed18) -> Result<(), FixedError> {
        let protocol = amount.checked_mul(protocol_fee)?;
        self.protocol = self.protocol.checked_add(protocol)?;
        self.market = self.market.checked_add(amount.checked_sub(protocol)?)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStore {
    pub position: VersionedPosition,
    pub accumulators: Versioned<MarketAccumulator>,
    pub accounts: BTreeMap<AccountId, AccountPosition>,
    pub collateral: CollateralLedger,
    pub fees: FeeLedger,
}

impl LedgerStore {
    /// Empty ledger anchored at `version`.
    pub fn new(version: u64) -> Self {
        let mut accumulators = Versioned::new();
        accumulators.record(version, MarketAccumulator::default());
        LedgerStore {
            position: VersionedPosition::new(version),
            accumulators,
            accounts: BTreeMap::new(),
            collateral: CollateralLedger::new(),
            fees: FeeLedger::default(),
        }
    }

    pub fn accumulator_at(&self, version: u64) -> MarketAccumulator {
        self.accumulators.at(version).copied().unwrap_or_default()
    }

    pub fn account(&self, account: AccountId) -> Option<&AccountPosition> {
        self.accounts.get(&account)
    }
}
