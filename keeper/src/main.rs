//! Ledger Liquidation Keeper
//!
//! Replays a journal of oracle prices and account operations into a
//! settlement ledger, keeps every account settled, and liquidates accounts
//! whose collateral falls below maintenance.

mod config;
mod health;
mod journal;
mod queue;

use anyhow::{Context, Result};
use config::Config;
use journal::{Entry, JournalReader};
use perpetual_ledger::{Fixed18, Market, MemoryOracle, NoRewards};
use queue::HealthQueue;
use std::time::Duration;
use tokio::time;

type LedgerMarket = Market<MemoryOracle, NoRewards>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Ledger Liquidation Keeper");

    let config = Config::load().context("Failed to load keeper config")?;
    log::info!("Replaying journal: {}", config.journal_path().display());
    log::info!("Liquidator account: {}", config.liquidator);

    let mut reader = JournalReader::new(config.journal_path());
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs));

    // The market needs a first oracle version before it can exist
    let (mut market, pending) = loop {
        let mut entries = reader.poll()?;
        if let Some(oracle) = seed_oracle(&mut entries)? {
            let market = Market::without_rewards(config.market, oracle).context("Failed to open market")?;
            break (market, entries);
        }
        if !config.follow {
            anyhow::bail!("Journal has no price entry");
        }
        interval.tick().await;
    };

    let mut queue = HealthQueue::new();
    process_batch(&mut market, &mut queue, &config, pending);

    if !config.follow {
        log_summary(&market, &queue);
        return Ok(());
    }

    log::info!("Keeper service started. Following journal...");

    loop {
        interval.tick().await;

        match reader.poll() {
            Ok(entries) => process_batch(&mut market, &mut queue, &config, entries),
            Err(e) => log::error!("Error polling journal: {:#}", e),
        }

        log::debug!("Journal offset: {}", reader.offset());

        if !queue.is_empty() {
            log::debug!("Health queue size: {}", queue.len());

            if let Some(worst) = queue.peek() {
                log::debug!("Worst health: {} ({})", worst.health, worst.account);
            }
        }
    }
}

/// Build the oracle from the first price entry, dropping anything before it
fn seed_oracle(entries: &mut Vec<Entry>) -> Result<Option<MemoryOracle>> {
    let Some(first) = entries.iter().position(|e| matches!(e, Entry::Price { .. })) else {
        for entry in entries.drain(..) {
            log::warn!("Dropping {:?}: no oracle price yet", entry);
        }
        return Ok(None);
    };

    let mut oracle = None;
    for entry in entries.drain(..=first) {
        match entry {
            Entry::Price { timestamp, price } => {
                oracle = Some(MemoryOracle::starting_at(timestamp, price).context("Invalid first price")?);
            }
            other => log::warn!("Dropping {:?}: no oracle price yet", other),
        }
    }
    Ok(oracle)
}

/// Apply entries, settle everything, and liquidate what has gone underwater
fn process_batch(market: &mut LedgerMarket, queue: &mut HealthQueue, config: &Config, entries: Vec<Entry>) {
    for entry in &entries {
        if let Err(e) = journal::apply(market, entry) {
            log::warn!("Rejected {:?}: {}", entry, e);
        }
    }

    if let Err(e) = market.settle() {
        log::error!("Error settling market: {}", e);
        return;
    }

    update_health_queue(queue, market);

    if let Err(e) = process_liquidations(queue, market, config) {
        log::error!("Error processing liquidations: {:#}", e);
    }
}

/// Settle every account and refresh its health
fn update_health_queue(queue: &mut HealthQueue, market: &mut LedgerMarket) {
    let accounts: Vec<_> = market.accounts().collect();
    queue.clear();

    for account in accounts {
        if let Err(e) = market.settle_account(account) {
            log::warn!("Failed to settle {}: {}", account, e);
            continue;
        }
        match health::account_health(market, account) {
            Ok(health) => queue.push(health),
            Err(e) => log::warn!("Failed to compute health of {}: {}", account, e),
        }
    }
}

/// Liquidate the worst accounts, up to the configured batch size
fn process_liquidations(queue: &mut HealthQueue, market: &mut LedgerMarket, config: &Config) -> Result<usize> {
    let liquidatable = queue.get_liquidatable(Fixed18::ZERO);

    if liquidatable.is_empty() {
        log::debug!("No accounts need liquidation");
        return Ok(0);
    }

    log::info!("Found {} accounts needing liquidation", liquidatable.len());

    let batch_size = config.max_liquidations_per_batch.min(liquidatable.len());
    let mut liquidated = 0;

    for account_health in liquidatable.iter().take(batch_size) {
        let account = account_health.account;
        log::info!(
            "Liquidating {} (health: {}, collateral: {}, maintenance: {})",
            account,
            account_health.health,
            account_health.collateral,
            account_health.maintenance
        );

        match market.liquidate(account, config.liquidator) {
            Ok(fee) => {
                log::info!("Liquidated {}, fee {} to {}", account, fee, config.liquidator);
                queue.remove(&account);
                liquidated += 1;
            }
            Err(e) => {
                log::error!("Failed to liquidate {}: {}", account, e);
            }
        }
    }

    if liquidated < batch_size {
        anyhow::bail!("{} of {} liquidations failed", batch_size - liquidated, batch_size);
    }
    Ok(liquidated)
}

fn log_summary(market: &LedgerMarket, queue: &HealthQueue) {
    let position = market.global_position();
    let fees = market.fees();
    log::info!(
        "Version {}: maker {}, taker {}, {} accounts",
        market.latest_version(),
        position.maker,
        position.taker,
        queue.len()
    );
    log::info!(
        "Fees: protocol {}, market {}; shortfall {}",
        fees.protocol,
        fees.market,
        market.shortfall()
    );
    match market.total_collateral() {
        Ok(total) => log::info!("Total collateral: {}", total),
        Err(e) => log::warn!("Failed to total collateral: {}", e),
    }
}
