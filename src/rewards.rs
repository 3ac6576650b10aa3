//! Incentive collaborator interface
//!
//! After an account settles, the engine reports the account's share delta
//! (position-weighted time since its last settlement) to a [`RewardSink`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::AccountId;
use crate::fixed::UFixed18;
use crate::oracle::OracleVersion;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RewardError(pub String);

/// What to do when the sink rejects a notification.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardFailurePolicy {
    /// Fail the whole operation; nothing is committed.
    #[default]
    Abort,
    /// Log the failure and commit anyway.
    Skip,
}

pub trait RewardSink {
    fn sync_account(
        &mut self,
        account: AccountId,
        share_delta: UFixed18,
        version: &OracleVersion,
    ) -> Result<(), RewardError>;

    /// Every account a single operation advanced, delivered in one call.
    ///
    /// An error rejects the whole batch. Sinks that cannot roll back a
    /// partially applied batch should override this and validate first.
    fn sync_accounts(&mut self, deltas: &[(AccountId, UFixed18)], version: &OracleVersion) -> Result<(), RewardError> {
        for &(account, share_delta) in deltas {
            self.sync_account(account, share_delta, version)?;
        }
        Ok(())
    }
}

/// Sink for markets without an incentive program.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoRewards;

impl RewardSink for NoRewards {
    fn sync_account(&mut self, _: AccountId, _: UFixed18, _: &OracleVersion) -> Result<(), RewardError> {
        Ok(())
    }
}
