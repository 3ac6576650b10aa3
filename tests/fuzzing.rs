//! Fuzzing tests for the settlement engine
//! Run with: cargo test --test fuzzing
//!
//! These tests use proptest to generate random inputs and verify invariants hold.

use perpetual_ledger::*;
use proptest::prelude::*;

const MILLI: u128 = 1_000_000_000_000_000;

fn milli(n: u64) -> UFixed18 {
    UFixed18::from_raw(n as u128 * MILLI)
}

fn default_params() -> MarketParams {
    MarketParams {
        maintenance: "0.1".parse().unwrap(),
        funding_fee: "0.1".parse().unwrap(),
        maker_fee: "0.001".parse().unwrap(),
        taker_fee: "0.001".parse().unwrap(),
        maker_limit: UFixed18::from_int(1_000_000),
        protocol_fee: "0.5".parse().unwrap(),
        liquidation_fee: "0.5".parse().unwrap(),
        min_collateral: UFixed18::ZERO,
        min_position: UFixed18::ZERO,
        utilization_curve: UtilizationCurve {
            minimum_rate: "0.0".parse().unwrap(),
            maximum_rate: "1.0".parse().unwrap(),
            target_rate: "0.1".parse().unwrap(),
            target_utilization: "0.8".parse().unwrap(),
        },
        payoff: Payoff::LONG,
        reward_failure: RewardFailurePolicy::Abort,
    }
}

// Strategy for generating position amounts (0.001 to 10)
fn amount_strategy() -> impl Strategy<Value = UFixed18> {
    (1u64..10_000).prop_map(milli)
}

// Strategy for generating prices (1 to 5000)
fn price_strategy() -> impl Strategy<Value = Fixed18> {
    (1i64..5_000).prop_map(Fixed18::from_int)
}

// Strategy for generating signed accumulator increments
fn increment_strategy() -> impl Strategy<Value = (Fixed18, UFixed18)> {
    (-1_000_000i64..1_000_000, 1u64..10_000).prop_map(|(amount, total)| (Fixed18::from_int(amount), milli(total)))
}

#[derive(Clone, Debug)]
enum Op {
    Request(u64, TradeKind, UFixed18),
    Deposit(u64, UFixed18),
    Withdraw(u64, UFixed18),
    Price(Fixed18),
    SettleAccount(u64),
}

fn kind_strategy() -> impl Strategy<Value = TradeKind> {
    prop_oneof![
        Just(TradeKind::OpenMake),
        Just(TradeKind::OpenTake),
        Just(TradeKind::CloseMake),
        Just(TradeKind::CloseTake),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..4, kind_strategy(), amount_strategy()).prop_map(|(a, k, n)| Op::Request(a, k, n)),
        (0u64..4, (1u64..1_000).prop_map(UFixed18::from_int)).prop_map(|(a, n)| Op::Deposit(a, n)),
        (0u64..4, (1u64..1_000).prop_map(UFixed18::from_int)).prop_map(|(a, n)| Op::Withdraw(a, n)),
        price_strategy().prop_map(Op::Price),
        (0u64..4).prop_map(Op::SettleAccount),
    ]
}

// Test that a pre is never realized at or below its own version
proptest! {
    #[test]
    fn fuzz_settled_noop_below_threshold(
        created in 0u64..1_000,
        back in 0u64..1_000,
        maker in amount_strategy(),
        price in price_strategy(),
    ) {
        let mut pre = PrePosition::default();
        pre.apply(TradeKind::OpenMake, created, maker).unwrap();
        let to = OracleVersion { version: created.saturating_sub(back), timestamp: 0, price };

        let position = Position::new(milli(7), UFixed18::ZERO);
        let (next, settled) = position.settled(&pre, &to).unwrap();
        prop_assert!(!settled);
        prop_assert_eq!(next, position);

        let later = OracleVersion { version: created + 1, ..to };
        let (next, settled) = position.settled(&pre, &later).unwrap();
        prop_assert!(settled);
        prop_assert_eq!(next.maker, milli(7).checked_add(maker).unwrap());
    }
}

// Test that accumulated deltas are additive across skipped versions
proptest! {
    #[test]
    fn fuzz_accumulator_additive(
        first in prop::collection::vec(increment_strategy(), 0..8),
        second in prop::collection::vec(increment_strategy(), 0..8),
    ) {
        let start = Accumulator::default();
        let mut v1 = start;
        for (amount, total) in first {
            v1.increment(amount, total).unwrap();
        }
        let mut v2 = v1;
        for (i, (amount, total)) in second.into_iter().enumerate() {
            if i % 2 == 0 {
                v2.increment(amount, total).unwrap();
            } else {
                v2.decrement(amount, total).unwrap();
            }
        }

        let skipped = v2.accumulated(&v1).unwrap();
        let via_start = v2
            .accumulated(&start)
            .unwrap()
            .checked_sub(v1.accumulated(&start).unwrap())
            .unwrap();
        prop_assert_eq!(skipped, via_start);
    }
}

// Test that the curve hits its anchors and clamps above full utilization
proptest! {
    #[test]
    fn fuzz_curve_clamped(excess in 1u128..1_000_000_000_000_000_000_000) {
        let curve = default_params().utilization_curve;
        prop_assert_eq!(curve.compute(UFixed18::ZERO).unwrap(), curve.minimum_rate);
        prop_assert_eq!(curve.compute(curve.target_utilization).unwrap(), curve.target_rate);
        prop_assert_eq!(curve.compute(UFixed18::ONE).unwrap(), curve.maximum_rate);
        let above = UFixed18::ONE.checked_add(UFixed18::from_raw(excess)).unwrap();
        prop_assert_eq!(curve.compute(above).unwrap(), curve.maximum_rate);
    }
}

// Test that closing more than held plus opened is always rejected
proptest! {
    #[test]
    fn fuzz_over_close_rejected(
        held in amount_strategy(),
        opened in amount_strategy(),
        extra in amount_strategy(),
    ) {
        let oracle = MemoryOracle::starting_at(0, Fixed18::from_int(100)).unwrap();
        let mut market = Market::without_rewards(default_params(), oracle).unwrap();
        let account = AccountId(1);
        market.deposit(account, UFixed18::from_int(100_000)).unwrap();
        market.open_make(account, held).unwrap();
        market.oracle_mut().push(1, Fixed18::from_int(100)).unwrap();
        market.settle_account(account).unwrap();

        market.open_make(account, opened).unwrap();
        let available = held.checked_add(opened).unwrap();
        let before = market.store().clone();
        let result = market.close_make(account, available.checked_add(extra).unwrap());
        prop_assert_eq!(result, Err(LedgerError::OverClosed));
        prop_assert_eq!(market.store(), &before);

        // Closing exactly what is available is fine
        market.close_make(account, available).unwrap();
    }
}

// Test that random request sequences never produce a double-sided account
// and that rejected operations never mutate the ledger
proptest! {
    #[test]
    fn fuzz_never_double_sided(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let oracle = MemoryOracle::starting_at(0, Fixed18::from_int(100)).unwrap();
        let mut market = Market::without_rewards(default_params(), oracle).unwrap();
        let mut timestamp = 0u64;

        for op in ops {
            let before = market.store().clone();
            let result = match op {
                Op::Request(a, kind, amount) => market.request(AccountId(a), kind, amount),
                Op::Deposit(a, amount) => market.deposit(AccountId(a), amount),
                Op::Withdraw(a, amount) => market.withdraw(AccountId(a), amount),
                Op::SettleAccount(a) => market.settle_account(AccountId(a)).map(|_| ()),
                Op::Price(price) => {
                    timestamp += 3_600;
                    market.oracle_mut().push(timestamp, price).unwrap();
                    market.settle().map(|_| ())
                }
            };
            if result.is_err() {
                prop_assert_eq!(market.store(), &before);
            }

            for account in market.accounts().collect::<Vec<_>>() {
                let state = market.store().accounts[&account];
                prop_assert!(!state.is_double_sided());
                let position = market.position(account);
                prop_assert!(position.maker.is_zero() || position.taker.is_zero());
            }
        }
    }
}
