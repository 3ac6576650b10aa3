//! Settlement engine
//!
//! `Market` owns the ledger store and the two collaborators (oracle feed and
//! reward sink). Every entry point runs the same transaction shape:
//!
//! 1. sync the oracle and apply the payoff
//! 2. stage the global transition up to the current version
//! 3. stage each touched account against the staged global timeline
//! 4. validate and apply the request to the staged state
//! 5. notify the reward sink
//! 6. commit
//!
//! Steps 1-5 never touch the store, so any error leaves the ledger exactly
//! as it was. Commit is infallible.
//!
//! A pending delta requested at version `L` is realized at `L + 1`. When
//! the current version is further ahead, settlement accrues `L -> L + 1`
//! with the old position, realizes the pre, then accrues `L + 1 -> current`
//! with the new one.

use arrayvec::ArrayVec;
use log::{debug, info, warn};

use crate::accumulator::MarketAccumulator;
use crate::account::{AccountId, AccountPosition};
use crate::collateral::settle_balance;
use crate::error::LedgerError;
use crate::fixed::{Fixed18, UFixed18};
use crate::maintenance::{maintenance, maintenance_next};
use crate::oracle::{OracleProvider, OracleVersion};
use crate::params::MarketParams;
use crate::position::{Position, PrePosition, TradeKind};
use crate::rewards::{NoRewards, RewardFailurePolicy, RewardSink};
use crate::store::{FeeLedger, LedgerStore};

/// Most accounts a single transaction touches (liquidated + liquidator).
const MAX_TOUCHED: usize = 2;

/// One accrual interval of a settlement pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SettlementStep {
    pub from: u64,
    pub to: u64,
    /// Realize the pending delta at `to`.
    pub realize_pre: bool,
}

/// Split the advance from `latest` to `current` into at most two steps.
pub fn settlement_steps(latest: u64, pre: &PrePosition, current: u64) -> ArrayVec<SettlementStep, 2> {
    let mut steps = ArrayVec::new();
    if current <= latest {
        return steps;
    }
    if pre.is_empty() {
        steps.push(SettlementStep {
            from: latest,
            to: current,
            realize_pre: false,
        });
        return steps;
    }
    let realize_at = latest + 1;
    steps.push(SettlementStep {
        from: latest,
        to: realize_at,
        realize_pre: true,
    });
    if current > realize_at {
        steps.push(SettlementStep {
            from: realize_at,
            to: current,
            realize_pre: false,
        });
    }
    steps
}

/// Outcome of a global settlement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub version: u64,
    pub position: Position,
}

/// Outcome of an account settlement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AccountSettlement {
    pub account: AccountId,
    pub version: u64,
    pub position: Position,
    /// Collateral credited (or debited) by this settlement, net of fees.
    pub value: Fixed18,
    /// Incentive share earned by this settlement.
    pub share: UFixed18,
}

#[derive(Clone, Debug)]
struct GlobalTransition {
    latest_version: u64,
    position: Position,
    pre: PrePosition,
    records: ArrayVec<(u64, Position, MarketAccumulator), 2>,
    fees: FeeLedger,
}

#[derive(Clone, Debug)]
struct AccountTransition {
    account: AccountId,
    state: AccountPosition,
    collateral: UFixed18,
    shortfall: UFixed18,
    value: Fixed18,
    share: UFixed18,
    /// Whether the account's latest version moved.
    advanced: bool,
}

#[derive(Clone, Debug)]
struct Staged {
    current: OracleVersion,
    global: GlobalTransition,
    accounts: ArrayVec<AccountTransition, MAX_TOUCHED>,
}

pub struct Market<O: OracleProvider, R: RewardSink = NoRewards> {
    params: MarketParams,
    oracle: O,
    rewards: R,
    store: LedgerStore,
}

impl<O: OracleProvider> Market<O, NoRewards> {
    pub fn without_rewards(params: MarketParams, oracle: O) -> Result<Self, LedgerError> {
        Self::new(params, oracle, NoRewards)
    }
}

impl<O: OracleProvider, R: RewardSink> Market<O, R> {
    /// Validate `params` and anchor an empty ledger at the oracle's current
    /// version.
    pub fn new(params: MarketParams, mut oracle: O, rewards: R) -> Result<Self, LedgerError> {
        params.validate()?;
        let current = oracle.sync()?;
        debug!("market anchored at version {}", current.version);
        Ok(Market {
            params,
            oracle,
            rewards,
            store: LedgerStore::new(current.version),
        })
    }

    // ---------------------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------------------

    pub fn open_make(&mut self, account: AccountId, amount: UFixed18) -> Result<(), LedgerError> {
        self.request(account, TradeKind::OpenMake, amount)
    }

    pub fn open_take(&mut self, account: AccountId, amount: UFixed18) -> Result<(), LedgerError> {
        self.request(account, TradeKind::OpenTake, amount)
    }

    pub fn close_make(&mut self, account: AccountId, amount: UFixed18) -> Result<(), LedgerError> {
        self.request(account, TradeKind::CloseMake, amount)
    }

    pub fn close_take(&mut self, account: AccountId, amount: UFixed18) -> Result<(), LedgerError> {
        self.request(account, TradeKind::CloseTake, amount)
    }

    /// Queue a position change for `account` at the current version.
    ///
    /// Rejected before any mutation when the account is being liquidated,
    /// would over-close or become double-sided, would leave a side below the
    /// minimum position, breaks a market limit, or cannot cover the
    /// maintenance of its next position. Opening also needs at least the
    /// minimum collateral.
    pub fn request(&mut self, account: AccountId, kind: TradeKind, amount: UFixed18) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        self.transact(&[account], |params, staged| {
            let version = staged.current.version;
            let target = &mut staged.accounts[0];
            if target.state.liquidation {
                return Err(LedgerError::InLiquidation(account));
            }

            target.state.pre.apply(kind, version, amount)?;
            target.state.validate()?;
            staged.global.pre.apply(kind, version, amount)?;
            check_limits(params, kind, &staged.global)?;

            let next = target.state.next()?;
            check_min_position(params, &next)?;
            let required = maintenance(&next, staged.current.price, params.maintenance)?;
            if target.collateral < required {
                return Err(LedgerError::InsufficientCollateral {
                    required,
                    available: target.collateral,
                });
            }
            if kind.is_open() && target.collateral < params.min_collateral {
                return Err(LedgerError::CollateralBelowMinimum {
                    remaining: target.collateral,
                    minimum: params.min_collateral,
                });
            }
            debug!("{} {:?} {} at version {}", account, kind, amount, version);
            Ok(())
        })
    }

    /// Advance the global ledger to the current oracle version.
    pub fn settle(&mut self) -> Result<Settlement, LedgerError> {
        self.transact(&[], |_, staged| {
            Ok(Settlement {
                version: staged.current.version,
                position: staged.global.position,
            })
        })
    }

    /// Advance the global ledger and `account` to the current oracle version.
    pub fn settle_account(&mut self, account: AccountId) -> Result<AccountSettlement, LedgerError> {
        self.transact(&[account], |_, staged| {
            let target = &staged.accounts[0];
            Ok(AccountSettlement {
                account,
                version: staged.current.version,
                position: target.state.position,
                value: target.value,
                share: target.share,
            })
        })
    }

    pub fn deposit(&mut self, account: AccountId, amount: UFixed18) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        self.transact(&[account], |_, staged| {
            let target = &mut staged.accounts[0];
            target.collateral = target.collateral.checked_add(amount)?;
            debug!("{} deposited {}", account, amount);
            Ok(())
        })
    }

    /// Withdraw collateral, keeping at least the larger of current and
    /// next maintenance. A non-zero remainder must also meet the minimum.
    pub fn withdraw(&mut self, account: AccountId, amount: UFixed18) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        self.transact(&[account], |params, staged| {
            let price = staged.current.price;
            let target = &mut staged.accounts[0];
            let remaining = target
                .collateral
                .checked_sub(amount)
                .map_err(|_| LedgerError::InsufficientCollateral {
                    required: amount,
                    available: target.collateral,
                })?;

            let required = maintenance(&target.state.position, price, params.maintenance)?.max(
                maintenance_next(&target.state.position, &target.state.pre, price, params.maintenance)?,
            );
            if remaining < required {
                return Err(LedgerError::InsufficientCollateral {
                    required,
                    available: remaining,
                });
            }
            if !remaining.is_zero() && remaining < params.min_collateral {
                return Err(LedgerError::CollateralBelowMinimum {
                    remaining,
                    minimum: params.min_collateral,
                });
            }

            target.collateral = remaining;
            debug!("{} withdrew {}", account, amount);
            Ok(())
        })
    }

    /// Close the whole next position of an under-maintained account and
    /// pay the liquidation fee to `liquidator`.
    ///
    /// # Returns
    /// The fee moved to the liquidator.
    pub fn liquidate(&mut self, account: AccountId, liquidator: AccountId) -> Result<UFixed18, LedgerError> {
        if account == liquidator {
            return Err(LedgerError::SelfLiquidation);
        }
        self.transact(&[account, liquidator], |params, staged| {
            let version = staged.current.version;
            let (target, rest) = staged.accounts.split_at_mut(1);
            let (target, keeper) = (&mut target[0], &mut rest[0]);
            if target.state.liquidation {
                return Err(LedgerError::InLiquidation(account));
            }

            let required = maintenance(&target.state.position, staged.current.price, params.maintenance)?;
            if target.collateral >= required {
                return Err(LedgerError::NotLiquidatable(account));
            }

            // Market limits do not apply to a forced close.
            let next = target.state.next()?;
            for (kind, amount) in [(TradeKind::CloseMake, next.maker), (TradeKind::CloseTake, next.taker)] {
                if !amount.is_zero() {
                    target.state.pre.apply(kind, version, amount)?;
                    staged.global.pre.apply(kind, version, amount)?;
                }
            }
            target.state.liquidation = true;

            let fee = required.checked_mul(params.liquidation_fee)?.min(target.collateral);
            target.collateral = target.collateral.checked_sub(fee)?;
            keeper.collateral = keeper.collateral.checked_add(fee)?;

            info!(
                "liquidated {} at version {} (maintenance {}, fee {} to {})",
                account, version, required, fee, liquidator
            );
            Ok(fee)
        })
    }

    /// Pay down market shortfall, returning the amount applied.
    pub fn resolve_shortfall(&mut self, amount: UFixed18) -> UFixed18 {
        let resolved = self.store.collateral.resolve_shortfall(amount);
        if !resolved.is_zero() {
            info!("resolved {} of shortfall, {} outstanding", resolved, self.store.collateral.shortfall());
        }
        resolved
    }

    // ---------------------------------------------------------------------
    // Read accessors
    // ---------------------------------------------------------------------

    pub fn position(&self, account: AccountId) -> Position {
        self.store.account(account).map(|a| a.position).unwrap_or_default()
    }

    pub fn account_pre(&self, account: AccountId) -> PrePosition {
        self.store.account(account).map(|a| a.pre).unwrap_or_default()
    }

    /// Pending global delta.
    pub fn pre(&self) -> PrePosition {
        self.store.position.pre
    }

    /// Settled global position at the latest version.
    pub fn global_position(&self) -> Position {
        self.store.position.position()
    }

    pub fn position_at_version(&self, version: u64) -> Position {
        self.store.position.position_at_version(version)
    }

    pub fn accumulator_at_version(&self, version: u64) -> MarketAccumulator {
        self.store.accumulator_at(version)
    }

    pub fn latest_version(&self) -> u64 {
        self.store.position.latest_version
    }

    pub fn latest_version_of(&self, account: AccountId) -> Option<u64> {
        self.store.account(account).map(|a| a.latest_version)
    }

    /// Maintenance of the account's settled position at the current price.
    pub fn maintenance(&self, account: AccountId) -> Result<UFixed18, LedgerError> {
        let price = self.current_version()?.price;
        Ok(maintenance(&self.position(account), price, self.params.maintenance)?)
    }

    /// Maintenance once the account's pending delta is realized.
    pub fn maintenance_next(&self, account: AccountId) -> Result<UFixed18, LedgerError> {
        let price = self.current_version()?.price;
        Ok(maintenance_next(
            &self.position(account),
            &self.account_pre(account),
            price,
            self.params.maintenance,
        )?)
    }

    pub fn collateral(&self, account: AccountId) -> UFixed18 {
        self.store.collateral.balance(account)
    }

    pub fn total_collateral(&self) -> Result<UFixed18, LedgerError> {
        Ok(self.store.collateral.total()?)
    }

    pub fn shortfall(&self) -> UFixed18 {
        self.store.collateral.shortfall()
    }

    pub fn fees(&self) -> FeeLedger {
        self.store.fees
    }

    pub fn liquidatable(&self, account: AccountId) -> Result<bool, LedgerError> {
        Ok(self.collateral(account) < self.maintenance(account)?)
    }

    pub fn is_liquidating(&self, account: AccountId) -> bool {
        self.store.account(account).map(|a| a.liquidation).unwrap_or(false)
    }

    pub fn accounts(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.store.accounts.keys().copied()
    }

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Feeds such as `MemoryOracle` are driven through this handle.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn rewards(&self) -> &R {
        &self.rewards
    }

    pub fn rewards_mut(&mut self) -> &mut R {
        &mut self.rewards
    }

    // ---------------------------------------------------------------------
    // Transaction machinery
    // ---------------------------------------------------------------------

    /// Latest oracle version with the payoff applied, without syncing.
    pub fn current_version(&self) -> Result<OracleVersion, LedgerError> {
        let raw = self.oracle.current_version()?;
        Ok(self.params.payoff.transform(raw)?)
    }

    fn sync_version(&mut self) -> Result<OracleVersion, LedgerError> {
        let raw = self.oracle.sync()?;
        Ok(self.params.payoff.transform(raw)?)
    }

    fn version_at(&self, version: u64, current: &OracleVersion) -> Result<OracleVersion, LedgerError> {
        if version == current.version {
            return Ok(*current);
        }
        let raw = self.oracle.at_version(version)?;
        Ok(self.params.payoff.transform(raw)?)
    }

    fn transact<T, F>(&mut self, accounts: &[AccountId], apply: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&MarketParams, &mut Staged) -> Result<T, LedgerError>,
    {
        assert!(accounts.len() <= MAX_TOUCHED, "transaction touches too many accounts");
        let current = self.sync_version()?;
        let global = self.stage_global(&current)?;
        let mut touched = ArrayVec::new();
        for &account in accounts {
            touched.push(self.stage_account(account, &current, &global)?);
        }
        let mut staged = Staged {
            current,
            global,
            accounts: touched,
        };

        let out = apply(&self.params, &mut staged)?;
        let shortfall = staged
            .accounts
            .iter()
            .try_fold(self.store.collateral.shortfall(), |acc, t| acc.checked_add(t.shortfall))?;
        self.notify_rewards(&staged)?;
        self.commit(staged, shortfall);
        Ok(out)
    }

    fn stage_global(&self, current: &OracleVersion) -> Result<GlobalTransition, LedgerError> {
        let latest = self.store.position.latest_version;
        assert!(
            current.version >= latest,
            "oracle version regressed: {} < {}",
            current.version,
            latest
        );

        let mut position = self.store.position.position();
        let mut pre = self.store.position.pre;
        let mut accumulator = self.store.accumulator_at(latest);
        let mut fees = self.store.fees;
        let mut records = ArrayVec::new();

        for step in settlement_steps(latest, &pre, current.version) {
            let from = self.version_at(step.from, current)?;
            let to = self.version_at(step.to, current)?;

            let accrual = accumulator.accrue(&self.params, &position, &from, &to)?;
            accumulator = accrual.accumulator;
            fees.collect(accrual.funding_fee, self.params.protocol_fee)?;

            if step.realize_pre {
                let (next, settled) = position.settled(&pre, &to)?;
                if settled {
                    let fee = pre.compute_fee(self.params.maker_fee, self.params.taker_fee, to.price)?;
                    fees.collect(fee, self.params.protocol_fee)?;
                    position = next;
                    pre = PrePosition::default();
                }
            }
            records.push((to.version, position, accumulator));
        }

        Ok(GlobalTransition {
            latest_version: current.version,
            position,
            pre,
            records,
            fees,
        })
    }

    /// Accumulator at `version` as seen through the staged global records.
    fn staged_accumulator(&self, version: u64, global: &GlobalTransition) -> MarketAccumulator {
        global
            .records
            .iter()
            .rev()
            .find(|(v, _, _)| *v <= version)
            .map(|(_, _, acc)| *acc)
            .unwrap_or_else(|| self.store.accumulator_at(version))
    }

    fn stage_account(
        &self,
        account: AccountId,
        current: &OracleVersion,
        global: &GlobalTransition,
    ) -> Result<AccountTransition, LedgerError> {
        let mut state = self
            .store
            .account(account)
            .copied()
            .unwrap_or_else(|| AccountPosition::new(current.version));
        let latest = state.latest_version;
        assert!(
            current.version >= latest,
            "oracle version regressed for {}: {} < {}",
            account,
            current.version,
            latest
        );

        let mut value = Fixed18::ZERO;
        let mut share = UFixed18::ZERO;
        let mut fee = UFixed18::ZERO;

        for step in settlement_steps(latest, &state.pre, current.version) {
            let from = self.staged_accumulator(step.from, global);
            let to = self.staged_accumulator(step.to, global);
            value = value.checked_add(to.value_since(&from, &state.position)?)?;
            share = share.checked_add(to.share_since(&from, &state.position)?)?;

            if step.realize_pre {
                let version = self.version_at(step.to, current)?;
                let (next, settled) = state.position.settled(&state.pre, &version)?;
                if settled {
                    fee = fee.checked_add(state.pre.compute_fee(
                        self.params.maker_fee,
                        self.params.taker_fee,
                        version.price,
                    )?)?;
                    state.position = next;
                    state.pre = PrePosition::default();
                }
            }
        }
        let advanced = current.version > latest;
        // The flag lifts once the forced close has been realized.
        if advanced && state.pre.is_empty() {
            state.liquidation = false;
        }
        state.latest_version = current.version;

        let delta = value.checked_sub(fee.to_signed()?)?;
        let (collateral, shortfall) = settle_balance(self.store.collateral.balance(account), delta)?;

        Ok(AccountTransition {
            account,
            state,
            collateral,
            shortfall,
            value: delta,
            share,
            advanced,
        })
    }

    fn notify_rewards(&mut self, staged: &Staged) -> Result<(), LedgerError> {
        let deltas: ArrayVec<(AccountId, UFixed18), MAX_TOUCHED> = staged
            .accounts
            .iter()
            .filter(|t| t.advanced)
            .map(|t| (t.account, t.share))
            .collect();
        if deltas.is_empty() {
            return Ok(());
        }
        if let Err(err) = self.rewards.sync_accounts(&deltas, &staged.current) {
            match self.params.reward_failure {
                RewardFailurePolicy::Abort => return Err(err.into()),
                RewardFailurePolicy::Skip => warn!("reward sync for {} account(s) skipped: {}", deltas.len(), err),
            }
        }
        Ok(())
    }

    fn commit(&mut self, staged: Staged, shortfall: UFixed18) {
        let Staged {
            current,
            global,
            accounts,
        } = staged;

        for (version, position, accumulator) in global.records {
            self.store.position.positions.record(version, position);
            self.store.accumulators.record(version, accumulator);
            debug!(
                "settled version {}: maker {} taker {}",
                version, position.maker, position.taker
            );
        }
        self.store.position.latest_version = global.latest_version;
        self.store.position.pre = global.pre;
        self.store.fees = global.fees;

        for t in accounts {
            if !t.shortfall.is_zero() {
                info!("{} settled into shortfall of {} at version {}", t.account, t.shortfall, current.version);
            }
            self.store.collateral.set_balance(t.account, t.collateral);
            self.store.accounts.insert(t.account, t.state);
        }
        self.store.collateral.set_shortfall(shortfall);
    }
}

/// Each side is either empty or at least `min_position`.
fn check_min_position(params: &MarketParams, position: &Position) -> Result<(), LedgerError> {
    for side in [position.maker, position.taker] {
        if !side.is_zero() && side < params.min_position {
            return Err(LedgerError::PositionBelowMinimum {
                position: side,
                minimum: params.min_position,
            });
        }
    }
    Ok(())
}

fn check_limits(params: &MarketParams, kind: TradeKind, global: &GlobalTransition) -> Result<(), LedgerError> {
    let next = global.position.next(&global.pre)?;
    check_min_position(params, &next)?;
    match kind {
        TradeKind::OpenMake if next.maker > params.maker_limit => Err(LedgerError::MakerOverLimit {
            next: next.maker,
            limit: params.maker_limit,
        }),
        TradeKind::OpenTake | TradeKind::CloseMake => {
            let factor = next.socialization_factor()?;
            if factor < UFixed18::ONE {
                Err(LedgerError::InsufficientLiquidity(factor))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}
