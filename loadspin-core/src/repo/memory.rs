// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-process repository with simulated latency.
//!
//! Used for dry runs without a database and as the store behind the
//! controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::SliceRandom;

use super::{Repo, MAX_WORKING_SET};
use crate::config::MemoryRepoConfig;
use crate::error::RepoError;
use crate::types::{AccountId, Region};

/// Opening balance of every simulated account.
const OPENING_BALANCE: f64 = 10_000.0;

pub struct MemoryRepo {
    accounts: Vec<AccountId>,
    /// One lock covers both legs of a transfer.
    balances: Mutex<HashMap<AccountId, f64>>,
    desired: DashMap<Region, i64>,
    latency: Duration,
    working_set_size: usize,
    transfers: AtomicU64,
}

impl MemoryRepo {
    /// Create `config.accounts` accounts named `acct-00000`, `acct-00001`, ...
    pub fn new(config: &MemoryRepoConfig, working_set_size: usize) -> Self {
        let accounts = (0..config.accounts)
            .map(|i| AccountId::new(format!("acct-{:05}", i)))
            .collect();
        Self::with_accounts(accounts)
            .with_latency(config.latency)
            .with_working_set_size(working_set_size)
    }

    /// Create a repo over exactly these accounts, with no simulated latency.
    pub fn with_accounts(accounts: Vec<AccountId>) -> Self {
        let balances = Mutex::new(
            accounts
                .iter()
                .map(|id| (id.clone(), OPENING_BALANCE))
                .collect(),
        );

        Self {
            accounts,
            balances,
            desired: DashMap::new(),
            latency: Duration::ZERO,
            working_set_size: MAX_WORKING_SET,
            transfers: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_working_set_size(mut self, size: usize) -> Self {
        self.working_set_size = size.min(MAX_WORKING_SET);
        self
    }

    /// Publish a new desired worker count for a region.
    pub fn set_desired_workers(&self, region: &Region, workers: i64) {
        self.desired.insert(region.clone(), workers);
    }

    pub fn balance(&self, id: &AccountId) -> Option<f64> {
        self.balances().get(id).copied()
    }

    /// Sum of every balance, read under a single lock.
    pub fn total_balance(&self) -> f64 {
        self.balances().values().sum()
    }

    fn balances(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, f64>> {
        self.balances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: f64,
    ) -> Result<(), RepoError> {
        let mut balances = self.balances();
        for id in [from, to] {
            if !balances.contains_key(id) {
                return Err(RepoError::NotFound {
                    entity: "account",
                    key: id.to_string(),
                });
            }
        }

        if let Some(balance) = balances.get_mut(from) {
            *balance -= amount;
        }
        if let Some(balance) = balances.get_mut(to) {
            *balance += amount;
        }
        Ok(())
    }

    /// Number of completed transfers.
    pub fn transfer_count(&self) -> u64 {
        self.transfers.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Repo for MemoryRepo {
    async fn fetch_desired_workers(&self, region: &Region) -> Result<i64, RepoError> {
        self.desired
            .get(region)
            .map(|w| *w)
            .ok_or_else(|| RepoError::NotFound {
                entity: "workload",
                key: region.to_string(),
            })
    }

    async fn fetch_working_set(&self) -> Result<Vec<AccountId>, RepoError> {
        let mut ids = self.accounts.clone();
        ids.shuffle(&mut rand::thread_rng());
        ids.truncate(self.working_set_size);
        Ok(ids)
    }

    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: f64,
    ) -> Result<(), RepoError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.apply_transfer(from, to, amount)?;
        self.transfers.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}
