//! Accounts ordered by health, worst first

use crate::health::AccountHealth;
use perpetual_ledger::{AccountId, Fixed18};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Default)]
pub struct HealthQueue {
    queue: PriorityQueue<AccountId, Reverse<Fixed18>>,
    entries: HashMap<AccountId, AccountHealth>,
}

impl HealthQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an account's health
    pub fn push(&mut self, health: AccountHealth) {
        self.queue.push(health.account, Reverse(health.health));
        self.entries.insert(health.account, health);
    }

    pub fn remove(&mut self, account: &AccountId) -> Option<AccountHealth> {
        self.queue.remove(account);
        self.entries.remove(account)
    }

    pub fn peek(&self) -> Option<&AccountHealth> {
        self.queue.peek().and_then(|(account, _)| self.entries.get(account))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.entries.clear();
    }

    /// Liquidatable accounts with health below `threshold`, worst first
    pub fn get_liquidatable(&self, threshold: Fixed18) -> Vec<AccountHealth> {
        self.queue
            .clone()
            .into_sorted_iter()
            .take_while(|(_, Reverse(health))| *health < threshold)
            .filter_map(|(account, _)| self.entries.get(&account).copied())
            .filter(AccountHealth::is_liquidatable)
            .collect()
    }
}
