// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Transactional data access used by workers and the target-count poller.
//!
//! The store is opaque to the controller: it only needs a working set of
//! account ids, a balance transfer between two of them, and (in target mode)
//! the desired worker count for a region.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::MemoryRepo;
pub use postgres::PostgresRepo;

use crate::config::{RepoConfig, RepoKind};
use crate::error::{LoadspinResult, RepoError};
use crate::types::{AccountId, Region};

/// Upper bound on the number of ids a worker samples from.
pub const MAX_WORKING_SET: usize = 1000;

/// Data access contract.
#[async_trait]
pub trait Repo: Send + Sync {
    /// Desired worker count for `region`, as published by an operator.
    async fn fetch_desired_workers(&self, region: &Region) -> Result<i64, RepoError>;

    /// Up to [`MAX_WORKING_SET`] account ids in random order.
    async fn fetch_working_set(&self) -> Result<Vec<AccountId>, RepoError>;

    /// Move `amount` from one account to another in a single statement.
    async fn transfer(&self, from: &AccountId, to: &AccountId, amount: f64)
        -> Result<(), RepoError>;
}

/// One synthetic transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    /// Drawn uniformly from `[0, 100)`.
    pub amount: f64,
}

/// Build the repository described by the configuration.
///
/// Connection failures are returned to the caller, which treats them as fatal.
pub async fn connect(config: &RepoConfig, region: &Region) -> LoadspinResult<Arc<dyn Repo>> {
    let repo: Arc<dyn Repo> = match &config.kind {
        RepoKind::Postgres {
            url,
            max_connections,
            region_scoped,
        } => {
            let scope = region_scoped.then(|| region.clone());
            let repo =
                PostgresRepo::connect(url, *max_connections, scope, config.working_set_size)
                    .await?;
            Arc::new(repo)
        }
        RepoKind::Memory(memory) => {
            let repo = MemoryRepo::new(memory, config.working_set_size);
            repo.set_desired_workers(region, memory.desired_workers);
            Arc::new(repo)
        }
    };

    Ok(repo)
}
