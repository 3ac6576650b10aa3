//! Vault-layer accounting on top of the settlement ledger
//!
//! A vault splits its assets between a maker position in a long market and
//! one in a short market. This crate keeps per-version checkpoints of that
//! split and prices vault shares at any historical version.
//!
//! ## Key Features
//!
//! - **Checkpointed history**: share price at version `v` needs only the
//!   checkpoint at or before `v` and two accumulator reads per market
//! - **Per-side loss clamping**: a side never loses more than it holds
//! - **Non-negative assets**: total vault assets floor at zero
//!
//! ## Usage Example
//!
//! ```rust
//! use perpetual_ledger::{Fixed18, UFixed18};
//! use vault_model::*;
//!
//! struct Flat;
//! impl ValueSource for Flat {
//!     fn maker_value_at(&self, _: u64) -> Fixed18 {
//!         Fixed18::ZERO
//!     }
//! }
//!
//! let mut vault = VaultLedger::new();
//! vault.record(VersionContext {
//!     version: 3,
//!     total_assets: UFixed18::from_int(100),
//!     total_shares: UFixed18::from_int(50),
//!     ..VersionContext::default()
//! });
//!
//! let shares = vault.convert_to_shares_at(UFixed18::from_int(10), 7, &Flat, &Flat).unwrap();
//! assert_eq!(shares, UFixed18::from_int(5));
//! ```

pub mod context;
pub mod ledger;
pub mod socialize;
pub mod source;

pub use context::VersionContext;
pub use ledger::{VaultError, VaultLedger};
pub use socialize::{socialize, SocializationOutcome};
pub use source::ValueSource;
