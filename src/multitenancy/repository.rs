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

use crate::app::database::PoolManager;
use crate::common::error::{TenancyError, TenancyResult};
use crate::multitenancy::fleet::TenantFleet;
use crate::multitenancy::identifier::TenantIdentifier;
use crate::multitenancy::model::{TenantConfig, TenantRow};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Gateway over the shared catalog database. Operations are transactional
/// within this store only; cross-store atomicity is recovered by the admin
/// flow, not provided here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Reads the full catalog.
    ///
    /// Soft-deleted entries are included; visibility filtering is the
    /// reconciler's concern, and the janitor cron needs to see the marked
    /// rows it has to clean up.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TenantConfig>)` - Every catalog row, in stable identifier
    ///   order.
    /// * `Err(TenancyError::Storage)` - The catalog store could not be
    ///   queried.
    async fn list_all_tenants(&self) -> TenancyResult<Vec<TenantConfig>>;

    /// Inserts a new catalog row for the tenant.
    ///
    /// # Arguments
    ///
    /// * `tenant` - The full tenant configuration; its identifier becomes
    ///   the row key.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The row was created.
    /// * `Err(TenancyError::DuplicateTenant)` - A row with the same
    ///   identifier triple already exists.
    /// * `Err(TenancyError::Storage)` - Any other database failure.
    async fn create_tenant(&self, tenant: &TenantConfig) -> TenancyResult<()>;

    /// Replaces the stored configuration of an existing tenant.
    ///
    /// Soft-delete markers are owned by the mark operations and are left
    /// untouched by an overwrite.
    ///
    /// # Arguments
    ///
    /// * `tenant` - The replacement configuration; the identifier selects
    ///   the row and is itself immutable.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The row was updated.
    /// * `Err(TenancyError::UnknownTenant)` - No row exists for the
    ///   identifier.
    /// * `Err(TenancyError::Storage)` - Any other database failure.
    async fn overwrite_tenant_config(&self, tenant: &TenantConfig) -> TenancyResult<()>;

    /// Removes the tenant's catalog row.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant to delete.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The row was deleted.
    /// * `Err(TenancyError::UnknownTenant)` - No row exists for the
    ///   identifier.
    /// * `Err(TenancyError::Storage)` - Any other database failure.
    async fn delete_tenant(&self, identifier: &TenantIdentifier) -> TenancyResult<()>;

    /// Sets the app soft-delete marker on every tenant row of the app.
    ///
    /// Idempotent: marking an already-marked or unknown app succeeds and
    /// changes nothing.
    ///
    /// # Arguments
    ///
    /// * `connection_uri_domain` - The domain scoping the app; app ids are
    ///   only unique within their domain.
    /// * `app_id` - The app whose tenants are marked.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The marker is set.
    /// * `Err(TenancyError::Storage)` - The update could not be executed.
    async fn mark_app_id_as_deleted(
        &self,
        connection_uri_domain: &str,
        app_id: &str,
    ) -> TenancyResult<()>;

    /// Sets the domain soft-delete marker on every tenant row of the
    /// connection URI domain. Idempotent like the app variant.
    ///
    /// # Arguments
    ///
    /// * `connection_uri_domain` - The domain whose tenants are marked.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The marker is set.
    /// * `Err(TenancyError::Storage)` - The update could not be executed.
    async fn mark_connection_uri_domain_as_deleted(
        &self,
        connection_uri_domain: &str,
    ) -> TenancyResult<()>;
}

/// Gateway over the tenant-targeted user-pool databases. Each call is routed
/// to the physical database hosting the identified tenant's user data; the
/// association operations are routed by their `source` identifier.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserPoolRepository: Send + Sync {
    /// Records the tenant's membership inside its hosting database.
    ///
    /// The app's base tenant (default tenant component) carries the app row
    /// into the pool; any other tenant requires the app row to already be
    /// there.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant whose membership row is written; also
    ///   selects the hosting pool.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The membership row exists (the insert is idempotent).
    /// * `Err(TenancyError::TenantOrAppNotFound)` - The hosting database no
    ///   longer recognizes the parent app.
    /// * `Err(TenancyError::Storage)` - Any other database failure.
    async fn add_tenant_id_in_user_pool(&self, identifier: &TenantIdentifier) -> TenancyResult<()>;

    /// Removes the tenant's membership row from its hosting database.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant whose membership row is removed.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The row is gone; removing an absent row succeeds.
    /// * `Err(TenancyError::Storage)` - The delete could not be executed.
    async fn delete_tenant_id_in_user_pool(
        &self,
        identifier: &TenantIdentifier,
    ) -> TenancyResult<()>;

    /// Associates a user with `target`, writing into the database hosting
    /// `source`.
    ///
    /// Routing by `source` is the contract: the caller resolved `source`,
    /// and `target` may not be known to the fleet's routing yet.
    ///
    /// # Arguments
    ///
    /// * `source` - The tenant the caller is operating from; selects the
    ///   hosting pool.
    /// * `target` - The sibling tenant the user is associated with; its
    ///   identifier is what the row records.
    /// * `user_id` - The user being associated.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The association exists (the insert is idempotent).
    /// * `Err(TenancyError::UnknownUserId)` - The hosting database has no
    ///   such user.
    /// * `Err(TenancyError::TenantOrAppNotFound)` - The hosting database
    ///   does not know `target`.
    /// * `Err(TenancyError::Storage)` - Any other database failure.
    async fn add_user_id_to_tenant(
        &self,
        source: &TenantIdentifier,
        target: &TenantIdentifier,
        user_id: Uuid,
    ) -> TenancyResult<()>;

    /// Associates a role with `target`, writing into the database hosting
    /// `source`. Routing follows the same contract as
    /// [`UserPoolRepository::add_user_id_to_tenant`].
    ///
    /// # Arguments
    ///
    /// * `source` - The tenant the caller is operating from; selects the
    ///   hosting pool.
    /// * `target` - The sibling tenant the role is associated with.
    /// * `role` - The role being associated.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The association exists (the insert is idempotent).
    /// * `Err(TenancyError::UnknownRole)` - The hosting database has no such
    ///   role.
    /// * `Err(TenancyError::TenantOrAppNotFound)` - The hosting database
    ///   does not know `target`.
    /// * `Err(TenancyError::Storage)` - Any other database failure.
    async fn add_role_to_tenant(
        &self,
        source: &TenantIdentifier,
        target: &TenantIdentifier,
        role: &str,
    ) -> TenancyResult<()>;
}

pub struct CatalogStore {
    pool_manager: Arc<dyn PoolManager>,
}

impl CatalogStore {
    pub fn new(pool_manager: Arc<dyn PoolManager>) -> Self {
        Self { pool_manager }
    }

    fn pool(&self) -> PgPool {
        self.pool_manager.get_catalog_pool()
    }
}

#[async_trait]
impl CatalogRepository for CatalogStore {
    async fn list_all_tenants(&self) -> TenancyResult<Vec<TenantConfig>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT *
            FROM tenant_configs
            ORDER BY connection_uri_domain, app_id, tenant_id
            "#,
        )
        .fetch_all(&self.pool())
        .await?;
        rows.into_iter().map(TenantConfig::try_from).collect()
    }

    async fn create_tenant(&self, tenant: &TenantConfig) -> TenancyResult<()> {
        let (connection_uri_domain, app_id, tenant_id) = tenant.identifier().as_tuple();
        sqlx::query(
            r#"
            INSERT INTO tenant_configs (
                connection_uri_domain, app_id, tenant_id,
                email_password_enabled,
                third_party_enabled, third_party_providers,
                passwordless_enabled, core_config,
                app_id_marked_as_deleted, connection_uri_domain_marked_as_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, FALSE)
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .bind(tenant.email_password.enabled)
        .bind(tenant.third_party.enabled)
        .bind(Value::Array(tenant.third_party.providers.clone()))
        .bind(tenant.passwordless.enabled)
        .bind(Value::Object(tenant.core_config.as_map().clone()))
        .execute(&self.pool())
        .await
        .map_err(TenancyError::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                TenancyError::DuplicateTenant(tenant.identifier().clone())
            } else {
                e
            }
        })?;
        Ok(())
    }

    async fn overwrite_tenant_config(&self, tenant: &TenantConfig) -> TenancyResult<()> {
        let (connection_uri_domain, app_id, tenant_id) = tenant.identifier().as_tuple();
        let result = sqlx::query(
            r#"
            UPDATE tenant_configs
            SET email_password_enabled = $4,
                third_party_enabled = $5,
                third_party_providers = $6,
                passwordless_enabled = $7,
                core_config = $8
            WHERE connection_uri_domain = $1
                AND app_id = $2
                AND tenant_id = $3
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .bind(tenant.email_password.enabled)
        .bind(tenant.third_party.enabled)
        .bind(Value::Array(tenant.third_party.providers.clone()))
        .bind(tenant.passwordless.enabled)
        .bind(Value::Object(tenant.core_config.as_map().clone()))
        .execute(&self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(TenancyError::UnknownTenant(tenant.identifier().clone()));
        }
        Ok(())
    }

    async fn delete_tenant(&self, identifier: &TenantIdentifier) -> TenancyResult<()> {
        let (connection_uri_domain, app_id, tenant_id) = identifier.as_tuple();
        let result = sqlx::query(
            r#"
            DELETE FROM tenant_configs
            WHERE connection_uri_domain = $1
                AND app_id = $2
                AND tenant_id = $3
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .execute(&self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(TenancyError::UnknownTenant(identifier.clone()));
        }
        Ok(())
    }

    async fn mark_app_id_as_deleted(
        &self,
        connection_uri_domain: &str,
        app_id: &str,
    ) -> TenancyResult<()> {
        sqlx::query(
            r#"
            UPDATE tenant_configs
            SET app_id_marked_as_deleted = TRUE
            WHERE connection_uri_domain = $1
                AND app_id = $2
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .execute(&self.pool())
        .await?;
        Ok(())
    }

    async fn mark_connection_uri_domain_as_deleted(
        &self,
        connection_uri_domain: &str,
    ) -> TenancyResult<()> {
        sqlx::query(
            r#"
            UPDATE tenant_configs
            SET connection_uri_domain_marked_as_deleted = TRUE
            WHERE connection_uri_domain = $1
            "#,
        )
        .bind(connection_uri_domain)
        .execute(&self.pool())
        .await?;
        Ok(())
    }
}

pub struct UserPoolStore {
    pool_manager: Arc<dyn PoolManager>,
    fleet: Arc<TenantFleet>,
}

impl UserPoolStore {
    pub fn new(pool_manager: Arc<dyn PoolManager>, fleet: Arc<TenantFleet>) -> Self {
        Self { pool_manager, fleet }
    }

    /// The pool hosting this tenant's user data, per the fleet's routing.
    fn pool_for(&self, identifier: &TenantIdentifier) -> TenancyResult<PgPool> {
        let pool_id = self
            .fleet
            .user_pool_key(identifier)?
            .unwrap_or_else(|| crate::multitenancy::model::DEFAULT_USER_POOL_ID.to_string());
        self.pool_manager.get_user_pool(&pool_id)
    }

    async fn tenant_known_to_pool(
        &self,
        pool: &PgPool,
        identifier: &TenantIdentifier,
    ) -> TenancyResult<bool> {
        let (connection_uri_domain, app_id, tenant_id) = identifier.as_tuple();
        let found = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT 1
            FROM tenants
            WHERE connection_uri_domain = $1
                AND app_id = $2
                AND tenant_id = $3
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl UserPoolRepository for UserPoolStore {
    async fn add_tenant_id_in_user_pool(&self, identifier: &TenantIdentifier) -> TenancyResult<()> {
        let pool = self.pool_for(identifier)?;
        let (connection_uri_domain, app_id, tenant_id) = identifier.as_tuple();

        if identifier.is_default_tenant() {
            // The app's base tenant carries the app row into the pool.
            sqlx::query(
                r#"
                INSERT INTO apps (connection_uri_domain, app_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(connection_uri_domain)
            .bind(app_id)
            .execute(&pool)
            .await?;
        } else {
            let app_found = sqlx::query_scalar::<_, i32>(
                r#"
                SELECT 1
                FROM apps
                WHERE connection_uri_domain = $1
                    AND app_id = $2
                "#,
            )
            .bind(connection_uri_domain)
            .bind(app_id)
            .fetch_optional(&pool)
            .await?;
            if app_found.is_none() {
                return Err(TenancyError::TenantOrAppNotFound(identifier.clone()));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO tenants (connection_uri_domain, app_id, tenant_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .execute(&pool)
        .await
        .map_err(TenancyError::from)
        .map_err(|e| {
            if e.is_foreign_key_violation() {
                TenancyError::TenantOrAppNotFound(identifier.clone())
            } else {
                e
            }
        })?;
        Ok(())
    }

    async fn delete_tenant_id_in_user_pool(
        &self,
        identifier: &TenantIdentifier,
    ) -> TenancyResult<()> {
        let pool = self.pool_for(identifier)?;
        let (connection_uri_domain, app_id, tenant_id) = identifier.as_tuple();
        sqlx::query(
            r#"
            DELETE FROM tenants
            WHERE connection_uri_domain = $1
                AND app_id = $2
                AND tenant_id = $3
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn add_user_id_to_tenant(
        &self,
        source: &TenantIdentifier,
        target: &TenantIdentifier,
        user_id: Uuid,
    ) -> TenancyResult<()> {
        // Pool selection follows source; the row records target.
        let pool = self.pool_for(source)?;
        let user_found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;
        if user_found.is_none() {
            return Err(TenancyError::UnknownUserId(user_id));
        }
        if !self.tenant_known_to_pool(&pool, target).await? {
            return Err(TenancyError::TenantOrAppNotFound(target.clone()));
        }
        let (connection_uri_domain, app_id, tenant_id) = target.as_tuple();
        sqlx::query(
            r#"
            INSERT INTO tenant_users (connection_uri_domain, app_id, tenant_id, user_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .bind(user_id)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn add_role_to_tenant(
        &self,
        source: &TenantIdentifier,
        target: &TenantIdentifier,
        role: &str,
    ) -> TenancyResult<()> {
        // Pool selection follows source; the row records target.
        let pool = self.pool_for(source)?;
        let role_found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM roles WHERE role = $1")
            .bind(role)
            .fetch_optional(&pool)
            .await?;
        if role_found.is_none() {
            return Err(TenancyError::UnknownRole(role.to_string()));
        }
        if !self.tenant_known_to_pool(&pool, target).await? {
            return Err(TenancyError::TenantOrAppNotFound(target.clone()));
        }
        let (connection_uri_domain, app_id, tenant_id) = target.as_tuple();
        sqlx::query(
            r#"
            INSERT INTO tenant_roles (connection_uri_domain, app_id, tenant_id, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(connection_uri_domain)
        .bind(app_id)
        .bind(tenant_id)
        .bind(role)
        .execute(&pool)
        .await?;
        Ok(())
    }
}
