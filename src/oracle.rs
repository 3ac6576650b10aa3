//! Oracle collaborator interface
//!
//! The engine never produces prices; it consumes monotonically increasing
//! `(version, timestamp, price)` checkpoints from an [`OracleProvider`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixed::Fixed18;

/// A single price checkpoint, the unit of settlement granularity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleVersion {
    pub version: u64,
    pub timestamp: u64,
    pub price: Fixed18,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle has not published any version")]
    NoVersion,
    #[error("oracle version {0} is not available")]
    UnknownVersion(u64),
    #[error("oracle timestamp {timestamp} precedes latest timestamp {latest}")]
    TimestampRegression { timestamp: u64, latest: u64 },
    #[error("oracle price must be non-zero")]
    InvalidPrice,
    #[error("oracle feed unavailable: {0}")]
    Unavailable(String),
}

/// Price feed consumed by the settlement engine.
///
/// Implementations must never report a version lower than one previously
/// returned; the engine treats a regression as a fatal invariant violation.
pub trait OracleProvider {
    /// Bring the feed up to date and return the current version.
    fn sync(&mut self) -> Result<OracleVersion, OracleError>;

    /// The latest published version without syncing.
    fn current_version(&self) -> Result<OracleVersion, OracleError>;

    /// A historical version.
    fn at_version(&self, version: u64) -> Result<OracleVersion, OracleError>;
}

/// In-process feed with contiguous versions starting at 0.
#[derive(Clone, Debug, Default)]
pub struct MemoryOracle {
    versions: Vec<OracleVersion>,
}

impl MemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed seeded with a first checkpoint.
    pub fn starting_at(timestamp: u64, price: Fixed18) -> Result<Self, OracleError> {
        let mut oracle = Self::new();
        oracle.push(timestamp, price)?;
        Ok(oracle)
    }

    /// Publish the next version.
    pub fn push(&mut self, timestamp: u64, price: Fixed18) -> Result<OracleVersion, OracleError> {
        if price.is_zero() {
            return Err(OracleError::InvalidPrice);
        }
        if let Some(latest) = self.versions.last() {
            if timestamp < latest.timestamp {
                return Err(OracleError::TimestampRegression {
                    timestamp,
                    latest: latest.timestamp,
                });
            }
        }
        let next = OracleVersion {
            version: self.versions.len() as u64,
            timestamp,
            price,
        };
        self.versions.push(next);
        Ok(next)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl OracleProvider for MemoryOracle {
    fn sync(&mut self) -> Result<OracleVersion, OracleError> {
        self.current_version()
    }

    fn current_version(&self) -> Result<OracleVersion, OracleError> {
        self.versions.last().copied().ok_or(OracleError::NoVersion)
    }

    fn at_version(&self, version: u64) -> Result<OracleVersion, OracleError> {
        usize::try_from(version)
            .ok()
            .and_then(|idx| self.versions.get(idx))
            .copied()
            .ok_or(OracleError::UnknownVersion(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_contiguous() {
        let mut oracle = MemoryOracle::new();
        assert_eq!(oracle.current_version(), Err(OracleError::NoVersion));

        let v0 = oracle.push(100, Fixed18::from_int(1000)).unwrap();
        let v1 = oracle.push(112, Fixed18::from_int(1010)).unwrap();
        assert_eq!(v0.version, 0);
        assert_eq!(v1.version, 1);
        assert_eq!(oracle.sync().unwrap(), v1);
        assert_eq!(oracle.at_version(0).unwrap(), v0);
        assert_eq!(oracle.at_version(2), Err(OracleError::UnknownVersion(2)));
    }

    #[test]
    fn test_rejects_bad_checkpoints() {
        let mut oracle = MemoryOracle::starting_at(100, Fixed18::from_int(1)).unwrap();
        assert_eq!(
            oracle.push(99, Fixed18::from_int(1)),
            Err(OracleError::TimestampRegression { timestamp: 99, latest: 100 })
        );
        assert_eq!(oracle.push(101, Fixed18::ZERO), Err(OracleError::InvalidPrice));
        assert_eq!(oracle.len(), 1);
    }
}
