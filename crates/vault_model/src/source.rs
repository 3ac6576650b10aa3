//! Where a vault reads per-version maker value from

use perpetual_ledger::{Fixed18, FixedError, Market, OracleProvider, RewardSink, UFixed18};

/// Read-only view of a market's maker value accumulator.
pub trait ValueSource {
    /// Cumulative value per unit of maker position at `version`.
    fn maker_value_at(&self, version: u64) -> Fixed18;

    /// PnL of holding `position` as a maker from `version` to `version + 1`.
    fn accumulated(&self, version: u64, position: UFixed18) -> Result<Fixed18, FixedError> {
        self.maker_value_at(version + 1)
            .checked_sub(self.maker_value_at(version))?
            .mul_unsigned(position)
    }
}

impl<O: OracleProvider, R: RewardSink> ValueSource for Market<O, R> {
    fn maker_value_at(&self, version: u64) -> Fixed18 {
        self.accumulator_at_version(version).value_maker.value()
    }
}
