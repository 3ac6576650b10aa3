//! Fast unit tests for the settlement engine
//! Run with: cargo test

use perpetual_ledger::*;

const A: AccountId = AccountId(1);
const B: AccountId = AccountId(2);

fn u(s: &str) -> UFixed18 {
    s.parse().unwrap()
}

fn f(s: &str) -> Fixed18 {
    s.parse().unwrap()
}

fn default_params() -> MarketParams {
    MarketParams {
        maintenance: u("0.30"),
        funding_fee: u("0.10"),
        maker_fee: UFixed18::ZERO,
        taker_fee: UFixed18::ZERO,
        maker_limit: u("1000"),
        protocol_fee: UFixed18::ZERO,
        liquidation_fee: u("0.5"),
        min_collateral: UFixed18::ZERO,
        min_position: UFixed18::ZERO,
        utilization_curve: UtilizationCurve {
            minimum_rate: f("0.00"),
            maximum_rate: f("1.00"),
            target_rate: f("0.10"),
            target_utilization: u("0.80"),
        },
        payoff: Payoff::LONG,
        reward_failure: RewardFailurePolicy::Abort,
    }
}

fn new_market(price: &str) -> Market<MemoryOracle> {
    let oracle = MemoryOracle::starting_at(1_000, f(price)).unwrap();
    Market::without_rewards(default_params(), oracle).unwrap()
}

#[test]
fn test_maker_and_taker_settle_into_position() {
    let mut market = new_market("1000");
    let n = market.latest_version();

    market.deposit(A, u("100")).unwrap();
    market.deposit(B, u("100")).unwrap();
    market.open_make(A, u("0.01")).unwrap();
    market.open_take(B, u("0.01")).unwrap();

    market.oracle_mut().push(1_012, f("1000")).unwrap();

    let settled = market.settle().unwrap();
    assert_eq!(settled.version, n + 1);
    assert_eq!(settled.position, Position::new(u("0.01"), u("0.01")));
    assert_eq!(market.position_at_version(n + 1), Position::new(u("0.01"), u("0.01")));

    let a = market.settle_account(A).unwrap();
    assert_eq!(a.position, Position::new(u("0.01"), UFixed18::ZERO));
    let b = market.settle_account(B).unwrap();
    assert_eq!(b.position, Position::new(UFixed18::ZERO, u("0.01")));

    assert_eq!(market.latest_version_of(A), Some(n + 1));
    assert_eq!(market.latest_version_of(B), Some(n + 1));
}

#[test]
fn test_maintenance_blocks_withdrawal() {
    let mut market = new_market("1000");
    market.deposit(A, u("700")).unwrap();
    market.deposit(B, u("1000")).unwrap();
    market.open_make(A, u("2")).unwrap();
    market.open_take(B, u("2")).unwrap();
    market.oracle_mut().push(1_000, f("1000")).unwrap();
    market.settle_account(A).unwrap();

    assert_eq!(market.maintenance(A).unwrap(), u("600"));
    assert_eq!(
        market.withdraw(A, u("100.000000000000000001")),
        Err(LedgerError::InsufficientCollateral {
            required: u("600"),
            available: u("599.999999999999999999"),
        })
    );
    market.withdraw(A, u("100")).unwrap();
    assert_eq!(market.collateral(A), u("600"));
}

#[test]
fn test_withdraw_checks_pending_position() {
    let mut market = new_market("1000");
    market.deposit(A, u("700")).unwrap();
    market.open_make(A, u("2")).unwrap();

    // Nothing settled yet, but the pending maker still needs 600
    assert_eq!(market.maintenance(A).unwrap(), UFixed18::ZERO);
    assert_eq!(market.maintenance_next(A).unwrap(), u("600"));
    assert!(market.withdraw(A, u("200")).is_err());
    market.withdraw(A, u("100")).unwrap();
}

#[test]
fn test_withdraw_more_than_balance() {
    let mut market = new_market("1000");
    market.deposit(A, u("10")).unwrap();
    assert_eq!(
        market.withdraw(A, u("15")),
        Err(LedgerError::InsufficientCollateral { required: u("15"), available: u("10") })
    );
    market.withdraw(A, u("10")).unwrap();
    assert_eq!(market.collateral(A), UFixed18::ZERO);
    assert_eq!(market.total_collateral().unwrap(), UFixed18::ZERO);
}

#[test]
fn test_minimum_collateral_on_withdraw() {
    let mut params = default_params();
    params.min_collateral = u("5");
    let oracle = MemoryOracle::starting_at(0, f("1000")).unwrap();
    let mut market = Market::without_rewards(params, oracle).unwrap();

    market.deposit(A, u("10")).unwrap();
    assert_eq!(
        market.withdraw(A, u("6")),
        Err(LedgerError::CollateralBelowMinimum { remaining: u("4"), minimum: u("5") })
    );
    market.withdraw(A, u("5")).unwrap();
    // Emptying the account entirely is always allowed
    market.withdraw(A, u("5")).unwrap();
}

#[test]
fn test_requests_at_same_version_merge() {
    let mut market = new_market("1000");
    market.deposit(A, u("1000")).unwrap();
    market.open_make(A, u("0.5")).unwrap();
    market.open_make(A, u("0.25")).unwrap();
    market.close_make(A, u("0.1")).unwrap();

    let pre = market.account_pre(A);
    assert_eq!(pre.open_position.maker, u("0.75"));
    assert_eq!(pre.close_position.maker, u("0.1"));
    assert_eq!(market.pre(), pre);

    market.oracle_mut().push(2_000, f("1000")).unwrap();
    let a = market.settle_account(A).unwrap();
    assert_eq!(a.position.maker, u("0.65"));
    assert_eq!(market.global_position().maker, u("0.65"));
}

#[test]
fn test_close_make_needs_liquidity() {
    let mut market = new_market("1000");
    market.deposit(A, u("1000")).unwrap();
    market.deposit(B, u("1000")).unwrap();
    market.open_make(A, u("1")).unwrap();
    market.open_take(B, u("1")).unwrap();
    market.oracle_mut().push(2_000, f("1000")).unwrap();

    // Makers cannot leave takers unbacked
    assert!(matches!(
        market.close_make(A, u("0.5")),
        Err(LedgerError::InsufficientLiquidity(_))
    ));
    market.close_take(B, u("0.5")).unwrap();
    market.close_make(A, u("0.5")).unwrap();
}

#[test]
fn test_funding_conserves_value_less_fee() {
    let mut market = new_market("1000");
    market.deposit(A, u("10000")).unwrap();
    market.deposit(B, u("10000")).unwrap();
    market.open_make(A, u("2")).unwrap();
    market.open_take(B, u("1")).unwrap();

    market.oracle_mut().push(1_000, f("1000")).unwrap();
    market.settle().unwrap();
    market.oracle_mut().push(1_000 + 86_400, f("1000")).unwrap();

    let a = market.settle_account(A).unwrap();
    let b = market.settle_account(B).unwrap();
    assert!(a.value > Fixed18::ZERO);
    assert!(b.value < Fixed18::ZERO);

    // Whatever makers received plus the fee is at most what takers paid
    let paid = b.value.abs();
    let received = a.value.abs().checked_add(market.fees().total().unwrap()).unwrap();
    assert!(received <= paid);
    // Rounding loses at most a few units in the last place
    assert!(paid.checked_sub(received).unwrap() <= UFixed18::from_raw(10));
}

/// A negative rate sends funding from makers to takers; the fee still comes
/// out of what the receiving side gets.
#[test]
fn test_negative_funding_conserves_value_less_fee() {
    let mut params = default_params();
    params.utilization_curve = UtilizationCurve {
        minimum_rate: f("-1"),
        maximum_rate: f("-1"),
        target_rate: f("-1"),
        target_utilization: u("0.80"),
    };
    let oracle = MemoryOracle::starting_at(1_000, f("100")).unwrap();
    let mut market = Market::without_rewards(params, oracle).unwrap();
    market.deposit(A, u("10000")).unwrap();
    market.deposit(B, u("10000")).unwrap();
    market.open_make(A, u("4")).unwrap();
    market.open_take(B, u("1")).unwrap();

    market.oracle_mut().push(1_000, f("100")).unwrap();
    market.settle().unwrap();
    market.oracle_mut().push(1_000 + SECONDS_PER_YEAR, f("100")).unwrap();

    let a = market.settle_account(A).unwrap();
    let b = market.settle_account(B).unwrap();
    assert_eq!(a.value, f("-100"));
    assert_eq!(b.value, f("90"));
    assert_eq!(market.fees().total().unwrap(), u("10"));

    let total = market
        .total_collateral()
        .unwrap()
        .checked_add(market.fees().total().unwrap())
        .unwrap();
    assert_eq!(total, u("20000"));
}

#[test]
fn test_unknown_account_reads_as_empty() {
    let market = new_market("1000");
    assert_eq!(market.position(A), Position::ZERO);
    assert!(market.account_pre(A).is_empty());
    assert_eq!(market.collateral(A), UFixed18::ZERO);
    assert_eq!(market.latest_version_of(A), None);
    assert!(!market.is_liquidating(A));
    assert!(!market.liquidatable(A).unwrap());
    assert_eq!(market.accounts().count(), 0);
}

#[test]
fn test_invalid_params_rejected() {
    let mut params = default_params();
    params.utilization_curve.target_utilization = u("1");
    let oracle = MemoryOracle::starting_at(0, f("1000")).unwrap();
    assert!(matches!(
        Market::without_rewards(params, oracle),
        Err(LedgerError::InvalidParams(_))
    ));
}

#[test]
fn test_missing_oracle_fails_cleanly() {
    assert!(matches!(
        Market::without_rewards(default_params(), MemoryOracle::new()),
        Err(LedgerError::Oracle(OracleError::NoVersion))
    ));
}
