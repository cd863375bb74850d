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
use crate::app::database::PoolManager;
use crate::common::error::{TenancyError, TenancyResult};
use crate::cron::CronScheduler;
use crate::features::{Feature, FeatureFlags};
use crate::multitenancy::identifier::TenantIdentifier;
use crate::multitenancy::model::{TenantConfig, TenantRuntimeConfig};
use crate::multitenancy::repository::CatalogRepository;
use crate::signing_keys::{SigningKeyManagers, SigningKeyRegistry};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// In-memory registry of per-tenant runtime resources: the visible catalog
/// snapshot, per-tenant config snapshots, user-pool routing, and the three
/// signing-key manager registries.
///
/// Reads clone the snapshot out of the lock and iterate outside it. The
/// reload path is serialized by `reload_lock`, so observers never see a
/// half-installed resource bundle; they may see a stale snapshot while a
/// reload is in flight.
pub struct TenantFleet {
    catalog: Arc<dyn CatalogRepository>,
    pool_manager: Arc<dyn PoolManager>,
    cron: Arc<CronScheduler>,
    features: FeatureFlags,
    user_pool_configs: HashMap<String, DatabaseConfig>,
    tenant_configs: RwLock<Vec<TenantConfig>>,
    runtime_configs: RwLock<HashMap<TenantIdentifier, Arc<TenantRuntimeConfig>>>,
    storage_keys: RwLock<HashMap<TenantIdentifier, String>>,
    signing_keys: SigningKeyRegistry,
    /// Set when a reload failed after the snapshot was replaced, so the next
    /// refresh retries the loads even without catalog drift.
    reload_pending: AtomicBool,
    reload_lock: tokio::sync::Mutex<()>,
}

impl TenantFleet {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        pool_manager: Arc<dyn PoolManager>,
        cron: Arc<CronScheduler>,
        features: FeatureFlags,
        user_pool_configs: HashMap<String, DatabaseConfig>,
    ) -> Self {
        Self {
            catalog,
            pool_manager,
            cron,
            features,
            user_pool_configs,
            tenant_configs: RwLock::new(Vec::new()),
            runtime_configs: RwLock::new(HashMap::new()),
            storage_keys: RwLock::new(HashMap::new()),
            signing_keys: SigningKeyRegistry::new(),
            reload_pending: AtomicBool::new(false),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Resolves the tenant config for `identifier` by a linear scan of the
    /// current snapshot.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant to look up.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(TenantConfig))` - The tenant is in the visible snapshot.
    /// * `Ok(None)` - No visible tenant has this identifier.
    /// * `Err(TenancyError::LockPoisoned)` - The snapshot lock was poisoned
    ///   by a panicking writer.
    pub fn resolve(&self, identifier: &TenantIdentifier) -> TenancyResult<Option<TenantConfig>> {
        let snapshot = self
            .tenant_configs
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(snapshot
            .iter()
            .find(|tenant| tenant.identifier() == identifier)
            .cloned())
    }

    /// Clones the visible snapshot out of the lock so callers can iterate
    /// without holding it.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TenantConfig>)` - The visible tenants as of the last
    ///   refresh, in catalog order.
    /// * `Err(TenancyError::LockPoisoned)` - The snapshot lock was poisoned.
    pub fn snapshot(&self) -> TenancyResult<Vec<TenantConfig>> {
        let snapshot = self
            .tenant_configs
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(snapshot.clone())
    }

    pub fn visible_identifiers(&self) -> TenancyResult<HashSet<TenantIdentifier>> {
        Ok(self
            .snapshot()?
            .iter()
            .map(|tenant| tenant.identifier().clone())
            .collect())
    }

    /// Hands out the signing-key manager triple serving `identifier`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant whose keys are requested; identifiers
    ///   unknown to the registry fall back to the default tenant's managers.
    ///
    /// # Returns
    ///
    /// * `Ok(SigningKeyManagers)` - The tenant's managers, or the default
    ///   tenant's for unknown identifiers.
    /// * `Err(TenancyError::UnknownTenant)` - Not even the default tenant
    ///   has managers yet, which only happens before the first reconcile.
    pub fn signing_key_managers(
        &self,
        identifier: &TenantIdentifier,
    ) -> TenancyResult<SigningKeyManagers> {
        if let Some(managers) = self.signing_keys.get(identifier)? {
            return Ok(managers);
        }
        let default_identifier = TenantIdentifier::default();
        self.signing_keys
            .get(&default_identifier)?
            .ok_or(TenancyError::UnknownTenant(default_identifier))
    }

    pub fn has_tenant_signing_keys(&self, identifier: &TenantIdentifier) -> TenancyResult<bool> {
        self.signing_keys.contains(identifier)
    }

    pub fn runtime_config(
        &self,
        identifier: &TenantIdentifier,
    ) -> TenancyResult<Option<Arc<TenantRuntimeConfig>>> {
        let configs = self
            .runtime_configs
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(configs.get(identifier).cloned())
    }

    /// The user-pool id hosting this tenant's data. Tenants sharing a
    /// `(connection_uri_domain, app_id)` pair always share a pool.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant whose routing entry is requested.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(String))` - The pool id recorded by the last reconcile.
    /// * `Ok(None)` - The fleet has no routing entry for this identifier.
    /// * `Err(TenancyError::LockPoisoned)` - The routing lock was poisoned.
    pub fn user_pool_key(&self, identifier: &TenantIdentifier) -> TenancyResult<Option<String>> {
        let keys = self
            .storage_keys
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(keys.get(identifier).cloned())
    }

    /// The pool handle hosting this tenant's data, falling back to the
    /// default pool for identifiers without a routing entry.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant whose storage handle is requested.
    ///
    /// # Returns
    ///
    /// * `Ok(PgPool)` - The shared handle of the tenant's user pool.
    /// * `Err(TenancyError::UserPoolNotFound)` - The routed pool is not
    ///   open.
    pub fn user_pool(&self, identifier: &TenantIdentifier) -> TenancyResult<PgPool> {
        let pool_id = self
            .user_pool_key(identifier)?
            .unwrap_or_else(|| crate::multitenancy::model::DEFAULT_USER_POOL_ID.to_string());
        self.pool_manager.get_user_pool(&pool_id)
    }

    /// Reconciles the fleet with the catalog.
    ///
    /// The catalog read happens before the reload lock is taken to keep the
    /// critical section short. Drift is the symmetric difference of the
    /// visible identifier sets. The snapshot is replaced unconditionally;
    /// resource loads only run on drift (or after a previously failed load),
    /// and their errors are logged and swallowed so the next invocation can
    /// retry against idempotent load-all targets.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The snapshot is current; resource loads either
    ///   succeeded or were logged and left for the next refresh.
    /// * `Err(TenancyError::Storage)` - The catalog itself could not be
    ///   read; the fleet keeps serving its previous snapshot.
    pub async fn refresh_if_required(&self) -> TenancyResult<()> {
        let mut fresh: Vec<TenantConfig> = self
            .catalog
            .list_all_tenants()
            .await?
            .into_iter()
            .filter(TenantConfig::is_visible)
            .collect();
        if !self.features.is_enabled(Feature::MultiTenancy) {
            fresh.retain(|tenant| tenant.identifier().is_default());
        }

        let _guard = self.reload_lock.lock().await;

        let fresh_identifiers: HashSet<TenantIdentifier> = fresh
            .iter()
            .map(|tenant| tenant.identifier().clone())
            .collect();
        let current_identifiers = self.visible_identifiers()?;
        let changed = fresh_identifiers
            .symmetric_difference(&current_identifiers)
            .next()
            .is_some();

        {
            let mut snapshot = self
                .tenant_configs
                .write()
                .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
            *snapshot = fresh.clone();
        }

        if !changed && !self.reload_pending.load(Ordering::SeqCst) {
            return Ok(());
        }

        match self.reload_resources(&fresh).await {
            Ok(()) => {
                self.reload_pending.store(false, Ordering::SeqCst);
                info!(tenants = fresh.len(), "tenant resources reloaded");
            }
            Err(e) => {
                self.reload_pending.store(true, Ordering::SeqCst);
                error!("tenant resource reload failed, will retry on next refresh: {e}");
            }
        }
        Ok(())
    }

    async fn reload_resources(&self, fresh: &[TenantConfig]) -> TenancyResult<()> {
        let runtime_configs = self.load_runtime_configs(fresh)?;
        self.load_storage(fresh, &runtime_configs).await?;
        self.load_signing_keys(&runtime_configs)?;
        self.cron.set_tenants_info(
            fresh
                .iter()
                .map(|tenant| tenant.identifier().clone())
                .collect(),
        )?;
        Ok(())
    }

    /// Materializes per-tenant config snapshots, reusing the existing
    /// snapshot wherever the raw core config is unchanged.
    fn load_runtime_configs(
        &self,
        fresh: &[TenantConfig],
    ) -> TenancyResult<Vec<(TenantIdentifier, Arc<TenantRuntimeConfig>)>> {
        let previous = {
            let configs = self
                .runtime_configs
                .read()
                .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
            configs.clone()
        };

        let mut next = HashMap::new();
        let mut ordered = Vec::with_capacity(fresh.len());
        for tenant in fresh {
            let identifier = tenant.identifier().clone();
            let snapshot = match previous.get(&identifier) {
                Some(existing) if existing.raw() == &tenant.core_config => existing.clone(),
                _ => Arc::new(TenantRuntimeConfig::try_from(&tenant.core_config)?),
            };
            next.insert(identifier.clone(), snapshot.clone());
            ordered.push((identifier, snapshot));
        }

        let mut configs = self
            .runtime_configs
            .write()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        *configs = next;
        Ok(ordered)
    }

    /// Opens/closes physical connections so one handle exists per distinct
    /// user pool, and records the identifier-to-pool routing. The pool of a
    /// `(connection_uri_domain, app_id)` group is taken from the app's base
    /// tenant when present, so every tenant of an app shares its storage.
    async fn load_storage(
        &self,
        fresh: &[TenantConfig],
        runtime_configs: &[(TenantIdentifier, Arc<TenantRuntimeConfig>)],
    ) -> TenancyResult<()> {
        let by_identifier: HashMap<&TenantIdentifier, &Arc<TenantRuntimeConfig>> = runtime_configs
            .iter()
            .map(|(identifier, config)| (identifier, config))
            .collect();

        let mut groups: HashMap<(String, String), Vec<&TenantConfig>> = HashMap::new();
        for tenant in fresh {
            let identifier = tenant.identifier();
            groups
                .entry((
                    identifier.connection_uri_domain().to_string(),
                    identifier.app_id().to_string(),
                ))
                .or_default()
                .push(tenant);
        }

        let mut routing = HashMap::new();
        let mut desired_pools = HashMap::new();
        for members in groups.values() {
            let anchor = members
                .iter()
                .find(|tenant| tenant.identifier().is_default_tenant())
                .unwrap_or(&members[0]);
            let pool_id = by_identifier
                .get(anchor.identifier())
                .map(|config| config.user_pool_id.clone())
                .unwrap_or_else(|| crate::multitenancy::model::DEFAULT_USER_POOL_ID.to_string());
            let pool_config = self.user_pool_configs.get(&pool_id).ok_or_else(|| {
                TenancyError::InvalidConfig(format!("user pool '{pool_id}' is not configured"))
            })?;
            desired_pools.insert(pool_id.clone(), pool_config.clone());
            for tenant in members {
                routing.insert(tenant.identifier().clone(), pool_id.clone());
            }
        }

        self.pool_manager.sync_user_pools(desired_pools).await?;

        let mut keys = self
            .storage_keys
            .write()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        *keys = routing;
        Ok(())
    }

    fn load_signing_keys(
        &self,
        runtime_configs: &[(TenantIdentifier, Arc<TenantRuntimeConfig>)],
    ) -> TenancyResult<()> {
        self.signing_keys.load_all(runtime_configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multitenancy::testsupport::{FakePoolManager, InMemoryCatalog, tenant_with_pool};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn identifier(cud: &str) -> TenantIdentifier {
        TenantIdentifier::new(Some(cud), None, None)
    }

    struct Harness {
        catalog: Arc<InMemoryCatalog>,
        pool_manager: Arc<FakePoolManager>,
        cron: Arc<CronScheduler>,
        fleet: TenantFleet,
    }

    fn harness(features: FeatureFlags) -> Harness {
        let catalog = Arc::new(InMemoryCatalog::with_default_tenant());
        let pool_manager = Arc::new(FakePoolManager::new());
        let cron = Arc::new(CronScheduler::new());
        let mut user_pool_configs = HashMap::new();
        for pool_id in ["default", "2"] {
            user_pool_configs.insert(
                pool_id.to_string(),
                crate::app::config::DatabaseConfigBuilder::default()
                    .build()
                    .unwrap(),
            );
        }
        let fleet = TenantFleet::new(
            catalog.clone(),
            pool_manager.clone(),
            cron.clone(),
            features,
            user_pool_configs,
        );
        Harness {
            catalog,
            pool_manager,
            cron,
            fleet,
        }
    }

    fn multi_tenant_harness() -> Harness {
        harness(FeatureFlags::default().with_enabled(Feature::MultiTenancy))
    }

    #[tokio::test]
    async fn refresh_installs_the_visible_snapshot() {
        let h = multi_tenant_harness();
        h.catalog.insert(tenant_with_pool(identifier("c1"), "default"));
        let mut hidden = tenant_with_pool(identifier("c2"), "default");
        hidden.app_id_marked_as_deleted = true;
        h.catalog.insert(hidden);

        h.fleet.refresh_if_required().await.unwrap();

        let visible = h.fleet.visible_identifiers().unwrap();
        assert_eq!(
            visible,
            HashSet::from([TenantIdentifier::default(), identifier("c1")])
        );
        assert!(h.fleet.has_tenant_signing_keys(&identifier("c1")).unwrap());
        assert!(!h.fleet.has_tenant_signing_keys(&identifier("c2")).unwrap());
        assert_eq!(
            h.cron.tenants_info().unwrap().len(),
            2,
            "cron receives the visible identifier list"
        );
        assert_eq!(
            h.fleet.user_pool_key(&identifier("c1")).unwrap().as_deref(),
            Some("default")
        );
    }

    #[tokio::test]
    async fn equal_size_swap_is_detected_as_drift() {
        let h = multi_tenant_harness();
        h.catalog.insert(tenant_with_pool(identifier("c1"), "default"));
        h.fleet.refresh_if_required().await.unwrap();
        assert!(h.fleet.has_tenant_signing_keys(&identifier("c1")).unwrap());

        // One removed, one added: the visible set size is unchanged.
        h.catalog.remove(&identifier("c1"));
        h.catalog.insert(tenant_with_pool(identifier("c2"), "default"));
        h.fleet.refresh_if_required().await.unwrap();

        assert!(!h.fleet.has_tenant_signing_keys(&identifier("c1")).unwrap());
        assert!(h.fleet.has_tenant_signing_keys(&identifier("c2")).unwrap());
        assert!(
            h.cron
                .tenants_info()
                .unwrap()
                .contains(&identifier("c2"))
        );
    }

    #[tokio::test]
    async fn refresh_without_drift_skips_the_reload() {
        let h = multi_tenant_harness();
        h.catalog.insert(tenant_with_pool(identifier("c1"), "default"));
        h.fleet.refresh_if_required().await.unwrap();
        let syncs = h.pool_manager.sync_count();

        h.fleet.refresh_if_required().await.unwrap();
        assert_eq!(h.pool_manager.sync_count(), syncs);
    }

    #[tokio::test]
    async fn tenants_share_the_pool_of_their_app_group() {
        let h = multi_tenant_harness();
        let base = identifier("c1");
        let sibling = base.with_tenant_id(Some("t1"));
        h.catalog.insert(tenant_with_pool(base.clone(), "2"));
        h.catalog.insert(tenant_with_pool(sibling.clone(), "default"));

        h.fleet.refresh_if_required().await.unwrap();

        // The app's base tenant anchors the group: both land on pool "2".
        assert_eq!(h.fleet.user_pool_key(&base).unwrap().as_deref(), Some("2"));
        assert_eq!(
            h.fleet.user_pool_key(&sibling).unwrap().as_deref(),
            Some("2")
        );
        let runtime = h.fleet.runtime_config(&base).unwrap().unwrap();
        assert_eq!(runtime.user_pool_id, "2");
    }

    #[tokio::test]
    async fn disabled_feature_flag_serves_only_the_default_tenant() {
        let h = harness(FeatureFlags::default());
        h.catalog.insert(tenant_with_pool(identifier("c1"), "default"));

        h.fleet.refresh_if_required().await.unwrap();

        assert_eq!(
            h.fleet.visible_identifiers().unwrap(),
            HashSet::from([TenantIdentifier::default()])
        );
        assert!(
            h.fleet
                .has_tenant_signing_keys(&TenantIdentifier::default())
                .unwrap(),
            "the default tenant stays functional"
        );
        assert!(!h.fleet.has_tenant_signing_keys(&identifier("c1")).unwrap());
    }

    #[tokio::test]
    async fn load_failure_is_swallowed_and_retried_on_the_next_refresh() {
        let h = multi_tenant_harness();
        let mut broken = tenant_with_pool(identifier("c1"), "default");
        broken
            .core_config
            .set(crate::multitenancy::model::USER_POOL_ID, json!("missing"));
        h.catalog.insert(broken);

        // The reload fails (unconfigured pool) but the refresh itself does
        // not error and the snapshot is still replaced.
        h.fleet.refresh_if_required().await.unwrap();
        assert!(
            h.fleet
                .visible_identifiers()
                .unwrap()
                .contains(&identifier("c1"))
        );
        let failed_syncs = h.pool_manager.sync_count();

        // Repairing the catalog row makes the next refresh converge even
        // though the visible identifier set did not change.
        h.catalog.remove(&identifier("c1"));
        h.catalog.insert(tenant_with_pool(identifier("c1"), "2"));
        h.fleet.refresh_if_required().await.unwrap();
        assert!(h.pool_manager.sync_count() > failed_syncs);
        assert_eq!(
            h.fleet.user_pool_key(&identifier("c1")).unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn resolve_scans_the_current_snapshot() {
        let h = multi_tenant_harness();
        h.catalog.insert(tenant_with_pool(identifier("c1"), "default"));
        h.fleet.refresh_if_required().await.unwrap();

        let found = h.fleet.resolve(&identifier("c1")).unwrap().unwrap();
        assert_eq!(found.identifier(), &identifier("c1"));
        assert!(h.fleet.resolve(&identifier("c9")).unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_identifier_falls_back_to_default_signing_keys() {
        let h = multi_tenant_harness();
        h.fleet.refresh_if_required().await.unwrap();

        let default_keys = h
            .fleet
            .signing_key_managers(&TenantIdentifier::default())
            .unwrap();
        let fallback = h.fleet.signing_key_managers(&identifier("c3")).unwrap();
        assert!(Arc::ptr_eq(
            &default_keys.access_token,
            &fallback.access_token
        ));
    }
}
