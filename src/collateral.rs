//! Collateral balances and shortfall
//!
//! Balances never go negative. A settlement debit larger than the balance
//! zeroes the account and records the remainder as market shortfall.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::fixed::{Fixed18, FixedError, UFixed18};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLedger {
    balances: BTreeMap<AccountId, UFixed18>,
    shortfall: UFixed18,
}

impl CollateralLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: AccountId) -> UFixed18 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn total(&self) -> Result<UFixed18, FixedError> {
        self.balances
            .values()
            .try_fold(UFixed18::ZERO, |acc, b| acc.checked_add(*b))
    }

    pub fn shortfall(&self) -> UFixed18 {
        self.shortfall
    }

    pub fn set_balance(&mut self, account: AccountId, balance: UFixed18) {
        if balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }

    pub(crate) fn set_shortfall(&mut self, shortfall: UFixed18) {
        self.shortfall = shortfall;
    }

    /// Pay down up to `amount` of shortfall, returning the amount applied.
    pub fn resolve_shortfall(&mut self, amount: UFixed18) -> UFixed18 {
        let resolved = amount.min(self.shortfall);
        self.shortfall = self.shortfall.saturating_sub(resolved);
        resolved
    }
}

/// Apply a signed settlement delta to a balance.
///
/// # Returns
/// `(new_balance, shortfall)` where `shortfall` is the part of a debit the
/// balance could not cover.
pub fn settle_balance(balance: UFixed18, delta: Fixed18) -> Result<(UFixed18, UFixed18), FixedError> {
    if delta.is_negative() {
        let debit = delta.abs();
        if debit > balance {
            Ok((UFixed18::ZERO, debit.checked_sub(balance)?))
        } else {
            Ok((balance.checked_sub(debit)?, UFixed18::ZERO))
        }
    } else {
        Ok((balance.checked_add(delta.abs())?, UFixed18::ZERO))
    }
}
