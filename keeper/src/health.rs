//! Account health against the maintenance requirement

use perpetual_ledger::{AccountId, Fixed18, LedgerError, Market, OracleProvider, RewardSink, UFixed18};

/// Collateral headroom of one account at the current oracle version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountHealth {
    pub account: AccountId,
    pub collateral: UFixed18,
    pub maintenance: UFixed18,
    /// `collateral - maintenance`; negative means liquidatable
    pub health: Fixed18,
    /// A forced close is already pending
    pub liquidating: bool,
}

impl AccountHealth {
    pub fn is_liquidatable(&self) -> bool {
        !self.liquidating && self.health.is_negative()
    }
}

pub fn account_health<O: OracleProvider, R: RewardSink>(
    market: &Market<O, R>,
    account: AccountId,
) -> Result<AccountHealth, LedgerError> {
    let collateral = market.collateral(account);
    let maintenance = market.maintenance(account)?;
    let health = collateral.to_signed()?.checked_sub(maintenance.to_signed()?)?;
    Ok(AccountHealth {
        account,
        collateral,
        maintenance,
        health,
        liquidating: market.is_liquidating(account),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use perpetual_ledger::{MarketParams, MemoryOracle, Payoff, RewardFailurePolicy, UtilizationCurve};

    pub(crate) fn params() -> MarketParams {
        MarketParams {
            maintenance: "0.3".parse().unwrap(),
            funding_fee: UFixed18::ZERO,
            maker_fee: UFixed18::ZERO,
            taker_fee: UFixed18::ZERO,
            maker_limit: UFixed18::from_int(1_000),
            protocol_fee: UFixed18::ZERO,
            liquidation_fee: "0.5".parse().unwrap(),
            min_collateral: UFixed18::ZERO,
            min_position: UFixed18::ZERO,
            utilization_curve: UtilizationCurve {
                minimum_rate: Fixed18::ZERO,
                maximum_rate: Fixed18::ZERO,
                target_rate: Fixed18::ZERO,
                target_utilization: "0.8".parse().unwrap(),
            },
            payoff: Payoff::LONG,
            reward_failure: RewardFailurePolicy::Abort,
        }
    }

    #[test]
    fn test_health_tracks_price() {
        let oracle = MemoryOracle::starting_at(0, Fixed18::from_int(100)).unwrap();
        let mut market = Market::without_rewards(params(), oracle).unwrap();
        let (maker, taker) = (AccountId(1), AccountId(2));
        market.deposit(maker, UFixed18::from_int(1_000)).unwrap();
        market.deposit(taker, UFixed18::from_int(40)).unwrap();
        market.open_make(maker, UFixed18::from_int(10)).unwrap();
        market.open_take(taker, UFixed18::from_int(1)).unwrap();

        // Nothing settled yet: no maintenance
        let health = account_health(&market, taker).unwrap();
        assert_eq!(health.health, Fixed18::from_int(40));
        assert!(!health.is_liquidatable());

        market.oracle_mut().push(10, Fixed18::from_int(100)).unwrap();
        market.settle_account(taker).unwrap();
        // 1 * 100 * 0.3 = 30
        let health = account_health(&market, taker).unwrap();
        assert_eq!(health.maintenance, UFixed18::from_int(30));
        assert_eq!(health.health, Fixed18::from_int(10));

        market.oracle_mut().push(20, Fixed18::from_int(70)).unwrap();
        market.settle_account(taker).unwrap();
        // Lost 30 on the move, maintenance now 21
        let health = account_health(&market, taker).unwrap();
        assert_eq!(health.collateral, UFixed18::from_int(10));
        assert_eq!(health.health, Fixed18::from_int(-11));
        assert!(health.is_liquidatable());
    }
}
