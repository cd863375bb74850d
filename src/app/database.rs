/*
 * This file is part of the Sentra authentication core.
 *
 * Copyright (C) 2026 Sentra Contributors <hello@sentra-auth.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::app::config::DatabaseConfig;
use crate::common::error::{TenancyError, TenancyResult};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Trait defining the behavior for managing the process's PostgreSQL
/// connection pools.
///
/// One pool serves the shared catalog database; user data lives in one or
/// more *user pools*, physical databases each hosting the users of one or
/// more tenants. The reconciler drives `sync_user_pools` so that exactly one
/// handle exists per pool named by the visible tenant set.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PoolManager: Send + Sync {
    /// Pool of the shared database holding the tenant catalog.
    fn get_catalog_pool(&self) -> PgPool;

    /// Pool of the named user-pool database.
    ///
    /// # Returns
    /// * `Ok(PgPool)` - The pool handle, shared by every tenant routed to it.
    /// * `Err(TenancyError::UserPoolNotFound)` - No such pool is open.
    fn get_user_pool(&self, pool_id: &str) -> TenancyResult<PgPool>;

    /// Ids of every currently open user pool.
    fn user_pool_ids(&self) -> TenancyResult<Vec<String>>;

    /// Aligns the open user pools with `desired`: connects pools that are
    /// missing and closes pools no tenant references anymore.
    async fn sync_user_pools(
        &self,
        desired: HashMap<String, DatabaseConfig>,
    ) -> TenancyResult<()>;
}

/// `PgPoolManager` holds the catalog pool plus a map of user-pool handles
/// keyed by pool id, guarded for concurrent readers against the reconciler's
/// reload writes.
pub struct PgPoolManager {
    catalog_pool: PgPool,
    user_pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

async fn connect(config: &DatabaseConfig) -> TenancyResult<PgPool> {
    let options = PgConnectOptions::from_str(&config.url())?
        .ssl_mode(config.pg_ssl_mode().map_err(TenancyError::InvalidConfig)?);
    Ok(PgPoolOptions::new()
        .max_connections(config.max_pool_size())
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await?)
}

impl PgPoolManager {
    pub async fn new(catalog_database_config: &DatabaseConfig) -> TenancyResult<PgPoolManager> {
        Ok(Self {
            catalog_pool: connect(catalog_database_config).await?,
            user_pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl PoolManager for PgPoolManager {
    fn get_catalog_pool(&self) -> PgPool {
        self.catalog_pool.clone()
    }

    fn get_user_pool(&self, pool_id: &str) -> TenancyResult<PgPool> {
        let guard = self
            .user_pools
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(guard
            .get(pool_id)
            .ok_or_else(|| TenancyError::UserPoolNotFound(pool_id.to_string()))?
            .clone())
    }

    fn user_pool_ids(&self) -> TenancyResult<Vec<String>> {
        let guard = self
            .user_pools
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(guard.keys().cloned().collect())
    }

    async fn sync_user_pools(
        &self,
        desired: HashMap<String, DatabaseConfig>,
    ) -> TenancyResult<()> {
        let existing: HashSet<String> = {
            let guard = self
                .user_pools
                .read()
                .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
            guard.keys().cloned().collect()
        };

        // Connections are opened outside the lock; the handle swap below is
        // the only part that blocks readers.
        let mut opened = Vec::new();
        for (pool_id, config) in &desired {
            if !existing.contains(pool_id) {
                opened.push((pool_id.clone(), connect(config).await?));
            }
        }

        let mut closed = Vec::new();
        {
            let mut pools = self
                .user_pools
                .write()
                .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
            for (pool_id, pool) in opened {
                pools.insert(pool_id, pool);
            }
            let stale: Vec<String> = pools
                .keys()
                .filter(|pool_id| !desired.contains_key(*pool_id))
                .cloned()
                .collect();
            for pool_id in stale {
                if let Some(pool) = pools.remove(&pool_id) {
                    closed.push(pool);
                }
            }
        }
        for pool in closed {
            pool.close().await;
        }
        Ok(())
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatabaseMigrator: Send + Sync {
    async fn migrate_catalog_db(&self, pool: &PgPool) -> TenancyResult<()>;
    async fn migrate_user_pool_db(&self, pool: &PgPool) -> TenancyResult<()>;
}

pub struct PgDatabaseMigrator;

#[async_trait]
impl DatabaseMigrator for PgDatabaseMigrator {
    async fn migrate_catalog_db(&self, pool: &PgPool) -> TenancyResult<()> {
        Ok(sqlx::migrate!("./migrations/catalog").run(pool).await?)
    }

    async fn migrate_user_pool_db(&self, pool: &PgPool) -> TenancyResult<()> {
        Ok(sqlx::migrate!("./migrations/userpool").run(pool).await?)
    }
}
