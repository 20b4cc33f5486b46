// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! PostgreSQL / CockroachDB repository.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE account (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     balance DECIMAL NOT NULL
//! );
//! CREATE TABLE workload (
//!     region STRING PRIMARY KEY,
//!     workers INT NOT NULL
//! );
//! ```
//!
//! With region scoping enabled the `account` table is assumed to be
//! `REGIONAL BY ROW`, so every statement also filters on `crdb_region`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{Repo, MAX_WORKING_SET};
use crate::error::RepoError;
use crate::types::{AccountId, Region};

const FETCH_DESIRED_WORKERS: &str = "SELECT workers FROM workload WHERE region = $1 LIMIT 1";

const FETCH_IDS: &str = "SELECT id::TEXT FROM account ORDER BY random() LIMIT $1";

const FETCH_IDS_SCOPED: &str = "SELECT id::TEXT FROM account \
     WHERE crdb_region = $1::crdb_internal_region \
     ORDER BY random() LIMIT $2";

const TRANSFER: &str = "UPDATE account \
     SET balance = CASE \
         WHEN id = $1::UUID THEN balance - $3::DECIMAL \
         WHEN id = $2::UUID THEN balance + $3::DECIMAL \
     END \
     WHERE id IN ($1::UUID, $2::UUID)";

const TRANSFER_SCOPED: &str = "UPDATE account \
     SET balance = CASE \
         WHEN id = $1::UUID THEN balance - $3::DECIMAL \
         WHEN id = $2::UUID THEN balance + $3::DECIMAL \
     END \
     WHERE id IN ($1::UUID, $2::UUID) \
     AND crdb_region = $4::crdb_internal_region";

/// Repository backed by a `PgPool`.
pub struct PostgresRepo {
    pool: PgPool,
    /// Restricts ids and transfers to rows homed in this region.
    scope: Option<Region>,
    working_set_size: usize,
}

impl PostgresRepo {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool, scope: Option<Region>, working_set_size: usize) -> Self {
        Self {
            pool,
            scope,
            working_set_size: working_set_size.min(MAX_WORKING_SET),
        }
    }

    /// Connect a new pool and verify it with a round trip.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        scope: Option<Region>,
        working_set_size: usize,
    ) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(|e| RepoError::Connect {
                reason: e.to_string(),
            })?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| RepoError::Connect {
                reason: e.to_string(),
            })?;

        tracing::info!(
            max_connections,
            scope = scope.as_ref().map(Region::as_str).unwrap_or("global"),
            "Connected to database"
        );

        Ok(Self::new(pool, scope, working_set_size))
    }
}

fn query_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> RepoError {
    move |e| RepoError::Query {
        operation,
        reason: e.to_string(),
    }
}

#[async_trait]
impl Repo for PostgresRepo {
    async fn fetch_desired_workers(&self, region: &Region) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(FETCH_DESIRED_WORKERS)
            .bind(region.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error("fetch_desired_workers"))?
            .ok_or_else(|| RepoError::NotFound {
                entity: "workload",
                key: region.to_string(),
            })
    }

    async fn fetch_working_set(&self) -> Result<Vec<AccountId>, RepoError> {
        let limit = self.working_set_size as i64;

        let ids: Vec<String> = match &self.scope {
            Some(region) => {
                sqlx::query_scalar(FETCH_IDS_SCOPED)
                    .bind(region.as_str())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar(FETCH_IDS)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(query_error("fetch_working_set"))?;

        Ok(ids.into_iter().map(AccountId::new).collect())
    }

    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: f64,
    ) -> Result<(), RepoError> {
        let query = match &self.scope {
            Some(region) => sqlx::query(TRANSFER_SCOPED)
                .bind(from.as_str())
                .bind(to.as_str())
                .bind(amount)
                .bind(region.as_str()),
            None => sqlx::query(TRANSFER)
                .bind(from.as_str())
                .bind(to.as_str())
                .bind(amount),
        };

        query
            .execute(&self.pool)
            .await
            .map_err(query_error("transfer"))?;

        Ok(())
    }
}
