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

use crate::app::config::AppConfig;
use crate::app::database::{DatabaseMigrator, PgDatabaseMigrator, PgPoolManager, PoolManager};
use crate::cron::CronScheduler;
use crate::multitenancy::fleet::TenantFleet;
use crate::multitenancy::repository::{
    CatalogRepository, CatalogStore, UserPoolRepository, UserPoolStore,
};
use crate::roles::repository::{RolePermissionsRepository, RolePermissionsStore};
use crate::signing_keys::SigningKeyRotationJob;
use std::sync::Arc;

pub(crate) mod dto;
pub(crate) mod error;
pub(crate) mod services;

pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> Arc<AppConfig>;
}

/// Process-wide state: the pool manager, the store gateways built over it,
/// the tenant fleet, and the cron scheduler the fleet feeds.
pub struct AppState<P>
where
    P: Send + Sync,
{
    pub config: Arc<AppConfig>,
    pub pool_manager: Arc<P>,
    pub migrator: Arc<dyn DatabaseMigrator>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub user_pool: Arc<dyn UserPoolRepository>,
    pub role_permissions: Arc<dyn RolePermissionsRepository>,
    pub cron: Arc<CronScheduler>,
    pub fleet: Arc<TenantFleet>,
}

pub type DefaultAppState = AppState<PgPoolManager>;

impl DefaultAppState {
    pub async fn new() -> anyhow::Result<DefaultAppState> {
        let config = Arc::new(AppConfig::from_env()?);
        Self::with_config(config).await
    }

    pub async fn with_config(config: Arc<AppConfig>) -> anyhow::Result<DefaultAppState> {
        let pool_manager = Arc::new(PgPoolManager::new(config.catalog_database()).await?);
        let cron = Arc::new(CronScheduler::new());
        let catalog = Arc::new(CatalogStore::new(pool_manager.clone()));
        let fleet = Arc::new(TenantFleet::new(
            catalog.clone(),
            pool_manager.clone(),
            cron.clone(),
            config.features(),
            config.user_pools().clone(),
        ));
        Ok(Self {
            config,
            pool_manager: pool_manager.clone(),
            migrator: Arc::new(PgDatabaseMigrator),
            catalog,
            user_pool: Arc::new(UserPoolStore::new(pool_manager, fleet.clone())),
            role_permissions: Arc::new(RolePermissionsStore::new(fleet.clone())),
            cron,
            fleet,
        })
    }

    /// Migrates the catalog, performs the initial reconcile (which opens the
    /// user pools of every visible tenant), migrates those pools, and starts
    /// the cron schedule.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        self.migrator
            .migrate_catalog_db(&self.pool_manager.get_catalog_pool())
            .await?;
        self.fleet.refresh_if_required().await?;
        for pool_id in self.pool_manager.user_pool_ids()? {
            let pool = self.pool_manager.get_user_pool(&pool_id)?;
            self.migrator.migrate_user_pool_db(&pool).await?;
        }
        self.cron
            .register_job(Arc::new(SigningKeyRotationJob::new(self.fleet.clone())))?;
        self.cron.spawn_all()?;
        Ok(())
    }
}

impl<P> ConfigProvider for AppState<P>
where
    P: Send + Sync,
{
    fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }
}
