//! JSON-lines journal of oracle prices and account operations
//!
//! One entry per line, tagged by `op`:
//!
//! ```text
//! {"op":"price","timestamp":100,"price":"1000"}
//! {"op":"deposit","account":1,"amount":"500"}
//! {"op":"open_take","account":1,"amount":"0.5"}
//! {"op":"settle"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use anyhow::{Context, Result};
use perpetual_ledger::{AccountId, Fixed18, LedgerError, Market, MemoryOracle, RewardSink, UFixed18};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Entry {
    Price { timestamp: u64, price: Fixed18 },
    Deposit { account: AccountId, amount: UFixed18 },
    Withdraw { account: AccountId, amount: UFixed18 },
    OpenMake { account: AccountId, amount: UFixed18 },
    OpenTake { account: AccountId, amount: UFixed18 },
    CloseMake { account: AccountId, amount: UFixed18 },
    CloseTake { account: AccountId, amount: UFixed18 },
    Settle,
    SettleAccount { account: AccountId },
}

pub fn parse_line(line: &str) -> Result<Option<Entry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let entry = serde_json::from_str(line).with_context(|| format!("Malformed journal entry: {}", line))?;
    Ok(Some(entry))
}

/// Apply one entry to the market.
pub fn apply<R: RewardSink>(market: &mut Market<MemoryOracle, R>, entry: &Entry) -> Result<(), LedgerError> {
    match *entry {
        Entry::Price { timestamp, price } => {
            market.oracle_mut().push(timestamp, price)?;
        }
        Entry::Deposit { account, amount } => market.deposit(account, amount)?,
        Entry::Withdraw { account, amount } => market.withdraw(account, amount)?,
        Entry::OpenMake { account, amount } => market.open_make(account, amount)?,
        Entry::OpenTake { account, amount } => market.open_take(account, amount)?,
        Entry::CloseMake { account, amount } => market.close_make(account, amount)?,
        Entry::CloseTake { account, amount } => market.close_take(account, amount)?,
        Entry::Settle => {
            market.settle()?;
        }
        Entry::SettleAccount { account } => {
            market.settle_account(account)?;
        }
    }
    Ok(())
}

/// Tails a journal file, returning only complete lines not seen before.
pub struct JournalReader {
    path: PathBuf,
    offset: u64,
}

impl JournalReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read entries appended since the last poll. A missing file reads as
    /// empty; a trailing partial line is left for the next poll.
    pub fn poll(&mut self) -> Result<Vec<Entry>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to open journal {}", self.path.display())),
        };
        file.seek(SeekFrom::Start(self.offset))
            .with_context(|| format!("Failed to seek journal {}", self.path.display()))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .with_context(|| format!("Failed to read journal {}", self.path.display()))?;

        let complete = match buf.rfind('\n') {
            Some(end) => &buf[..=end],
            None => return Ok(Vec::new()),
        };

        let mut entries = Vec::new();
        for line in complete.lines() {
            match parse_line(line) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping journal line: {:#}", e),
            }
        }
        self.offset += complete.len() as u64;
        Ok(entries)
    }
}
