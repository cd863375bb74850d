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

use crate::common::error::{ApiError, TenancyError, message_body};
use crate::multitenancy::MultitenancyModule;
use crate::multitenancy::identifier::TenantIdentifier;
use crate::multitenancy::model::TenantConfig;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Bound on the create/overwrite recovery loop. Each pass repairs one
/// interleaving with a concurrent parent deletion; storage that keeps
/// flapping past this budget is surfaced instead of chased.
const WRITE_RETRY_BUDGET: usize = 3;

#[derive(Debug, Error)]
pub enum TenancyServiceError {
    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error("operation must target the default {0}")]
    NonDefaultScope(&'static str),

    #[error("the default {0} cannot be deleted")]
    DefaultResourceProtected(&'static str),

    #[error("source and target tenant are the same")]
    SameTenantAssociation,

    #[error("tenant write did not converge after {0} attempts")]
    RetryBudgetExhausted(usize),
}

impl IntoResponse for TenancyServiceError {
    fn into_response(self) -> Response {
        match self {
            TenancyServiceError::Tenancy(e) => ApiError(e).into_response(),
            TenancyServiceError::NonDefaultScope(_)
            | TenancyServiceError::DefaultResourceProtected(_) => {
                message_body(StatusCode::FORBIDDEN, self.to_string())
            }
            TenancyServiceError::SameTenantAssociation => {
                message_body(StatusCode::BAD_REQUEST, self.to_string())
            }
            TenancyServiceError::RetryBudgetExhausted(_) => {
                error!("admin write failed: {self}");
                message_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal error"),
                )
            }
        }
    }
}

/// Admin and query operations over the tenant catalog. Every mutation first
/// touches the shared catalog and then forces a reconcile, so a subsequent
/// `resolve` in the same process observes the post-mutation state.
pub struct TenancyService;

impl TenancyService {
    /// Creates the tenant, or overwrites its config when it already exists.
    ///
    /// The shared-catalog write and the user-pool membership write are not
    /// atomic; a membership write that finds its parent concurrently deleted
    /// restarts the flow, which also repairs an earlier interrupted attempt
    /// that left the shared row without its membership row. The restart loop
    /// is bounded by [`WRITE_RETRY_BUDGET`].
    ///
    /// # Arguments
    ///
    /// * `tenant` - The configuration to install; its identifier names the
    ///   catalog row.
    /// * `module` - The module providing the catalog, the user-pool store,
    ///   and the fleet to reconcile.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - This call created the catalog row.
    /// * `Ok(false)` - The row already existed and its config was
    ///   overwritten.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::RetryBudgetExhausted` - The recovery loop ran
    ///   out of attempts against flapping storage.
    /// * `TenancyServiceError::Tenancy` - A catalog or user-pool failure that
    ///   the recovery protocol does not cover.
    pub async fn add_or_update(
        tenant: &TenantConfig,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<bool, TenancyServiceError> {
        let identifier = tenant.identifier();
        let mut created = false;
        for attempt in 0..WRITE_RETRY_BUDGET {
            if attempt > 0 {
                warn!(tenant = %identifier, attempt, "retrying tenant write");
            }
            match module.catalog_repo().create_tenant(tenant).await {
                Ok(()) => {
                    created = true;
                    module.fleet().refresh_if_required().await?;
                    match module
                        .user_pool_repo()
                        .add_tenant_id_in_user_pool(identifier)
                        .await
                    {
                        Ok(()) => {
                            info!(tenant = %identifier, "tenant created");
                            return Ok(created);
                        }
                        Err(TenancyError::TenantOrAppNotFound(_)) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(TenancyError::DuplicateTenant(_)) => {
                    match module.catalog_repo().overwrite_tenant_config(tenant).await {
                        Ok(()) => {}
                        // A concurrent identical create; the row is in place.
                        Err(TenancyError::DuplicateTenant(_)) => {}
                        Err(TenancyError::UnknownTenant(_)) => continue,
                        Err(e) => return Err(e.into()),
                    }
                    module.fleet().refresh_if_required().await?;
                    match module
                        .user_pool_repo()
                        .add_tenant_id_in_user_pool(identifier)
                        .await
                    {
                        Ok(()) => {
                            info!(tenant = %identifier, "tenant config overwritten");
                            return Ok(created);
                        }
                        Err(
                            TenancyError::TenantOrAppNotFound(_) | TenancyError::UnknownTenant(_),
                        ) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TenancyServiceError::RetryBudgetExhausted(WRITE_RETRY_BUDGET))
    }

    /// Deletes the tenant from its user pool (best effort) and the catalog,
    /// then reconciles so its runtime resources are destroyed.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant to delete.
    /// * `module` - The module providing the stores and the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The catalog row existed and was deleted.
    /// * `Ok(false)` - There was no such row; deletion is idempotent.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::DefaultResourceProtected` - The default
    ///   tenant was named; it can never be deleted.
    /// * `TenancyServiceError::Tenancy` - A storage failure outside the
    ///   not-found cases the flow tolerates.
    pub async fn delete_tenant(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<bool, TenancyServiceError> {
        if identifier.is_default() {
            return Err(TenancyServiceError::DefaultResourceProtected("tenant"));
        }
        match module
            .user_pool_repo()
            .delete_tenant_id_in_user_pool(identifier)
            .await
        {
            Ok(()) => {}
            Err(TenancyError::TenantOrAppNotFound(_) | TenancyError::UnknownTenant(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let existed = match module.catalog_repo().delete_tenant(identifier).await {
            Ok(()) => true,
            Err(TenancyError::UnknownTenant(_)) => false,
            Err(e) => return Err(e.into()),
        };
        module.fleet().refresh_if_required().await?;
        if existed {
            info!(tenant = %identifier, "tenant deleted");
        }
        Ok(existed)
    }

    /// Soft-deletes every tenant of the app named by `identifier`. Physical
    /// cleanup across user pools belongs to the janitor cron.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Names the app; its tenant component must be the
    ///   default.
    /// * `module` - The module providing the catalog and the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The marker is set and the fleet reconciled; marking an
    ///   already-deleted app succeeds.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::NonDefaultScope` - The identifier carries a
    ///   non-default tenant component.
    /// * `TenancyServiceError::DefaultResourceProtected` - The default app
    ///   of the default domain was named.
    /// * `TenancyServiceError::Tenancy` - The catalog update failed.
    pub async fn delete_app(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<(), TenancyServiceError> {
        if !identifier.is_default_tenant() {
            return Err(TenancyServiceError::NonDefaultScope("tenant"));
        }
        if identifier.is_default_app() && identifier.is_default_connection_uri_domain() {
            return Err(TenancyServiceError::DefaultResourceProtected("app"));
        }
        module
            .catalog_repo()
            .mark_app_id_as_deleted(identifier.connection_uri_domain(), identifier.app_id())
            .await?;
        module.fleet().refresh_if_required().await?;
        info!(app = identifier.app_id(), "app marked as deleted");
        Ok(())
    }

    /// Soft-deletes every tenant of the connection URI domain. Physical
    /// cleanup across user pools belongs to the janitor cron.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Names the domain; its tenant and app components must
    ///   both be the defaults.
    /// * `module` - The module providing the catalog and the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The marker is set and the fleet reconciled.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::NonDefaultScope` - The identifier carries a
    ///   non-default tenant or app component.
    /// * `TenancyServiceError::DefaultResourceProtected` - The default
    ///   domain was named.
    /// * `TenancyServiceError::Tenancy` - The catalog update failed.
    pub async fn delete_connection_uri_domain(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<(), TenancyServiceError> {
        if !identifier.is_default_tenant() || !identifier.is_default_app() {
            return Err(TenancyServiceError::NonDefaultScope("tenant and app"));
        }
        if identifier.is_default_connection_uri_domain() {
            return Err(TenancyServiceError::DefaultResourceProtected(
                "connection URI domain",
            ));
        }
        module
            .catalog_repo()
            .mark_connection_uri_domain_as_deleted(identifier.connection_uri_domain())
            .await?;
        module.fleet().refresh_if_required().await?;
        info!(
            connection_uri_domain = identifier.connection_uri_domain(),
            "connection URI domain marked as deleted"
        );
        Ok(())
    }

    /// Associates a user with the sibling tenant `new_tenant_id` of
    /// `source`. The write is routed to the storage hosting `source`; the
    /// row records the target identifier.
    ///
    /// # Arguments
    ///
    /// * `source` - The tenant the caller resolved; selects the hosting
    ///   storage.
    /// * `user_id` - The user being associated.
    /// * `new_tenant_id` - The tenant component of the target; `None` names
    ///   the default tenant.
    /// * `module` - The module providing the user-pool store and the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The association exists.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::SameTenantAssociation` - Source and target
    ///   name the same tenant.
    /// * `TenancyServiceError::Tenancy` - `UnknownUserId`,
    ///   `TenantOrAppNotFound`, or a storage failure, passed through as-is.
    pub async fn add_user_id_to_tenant(
        source: &TenantIdentifier,
        user_id: Uuid,
        new_tenant_id: Option<&str>,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<(), TenancyServiceError> {
        let target = source.with_tenant_id(new_tenant_id);
        if &target == source {
            return Err(TenancyServiceError::SameTenantAssociation);
        }
        module.fleet().refresh_if_required().await?;
        module
            .user_pool_repo()
            .add_user_id_to_tenant(source, &target, user_id)
            .await?;
        Ok(())
    }

    /// Associates a role with the sibling tenant `new_tenant_id` of
    /// `source`, routed like
    /// [`TenancyService::add_user_id_to_tenant`].
    ///
    /// # Arguments
    ///
    /// * `source` - The tenant the caller resolved; selects the hosting
    ///   storage.
    /// * `role` - The role being associated.
    /// * `new_tenant_id` - The tenant component of the target; `None` names
    ///   the default tenant.
    /// * `module` - The module providing the user-pool store and the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The association exists.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::SameTenantAssociation` - Source and target
    ///   name the same tenant.
    /// * `TenancyServiceError::Tenancy` - `UnknownRole`,
    ///   `TenantOrAppNotFound`, or a storage failure, passed through as-is.
    pub async fn add_role_to_tenant(
        source: &TenantIdentifier,
        role: &str,
        new_tenant_id: Option<&str>,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<(), TenancyServiceError> {
        let target = source.with_tenant_id(new_tenant_id);
        if &target == source {
            return Err(TenancyServiceError::SameTenantAssociation);
        }
        module.fleet().refresh_if_required().await?;
        module
            .user_pool_repo()
            .add_role_to_tenant(source, &target, role)
            .await?;
        Ok(())
    }

    /// Looks up one tenant, reconciling first so the answer reflects the
    /// current catalog.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The tenant to look up.
    /// * `module` - The module providing the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(TenantConfig))` - The tenant is visible.
    /// * `Ok(None)` - No visible tenant has this identifier.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::Tenancy` - The reconciling catalog read
    ///   failed.
    pub async fn get_tenant_info(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<Option<TenantConfig>, TenancyServiceError> {
        module.fleet().refresh_if_required().await?;
        Ok(module.fleet().resolve(identifier)?)
    }

    /// Lists the visible tenants sharing the app of `identifier`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Names the app; its tenant component must be the
    ///   default.
    /// * `module` - The module providing the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TenantConfig>)` - The visible tenants of the app, possibly
    ///   empty.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::NonDefaultScope` - The identifier carries a
    ///   non-default tenant component.
    /// * `TenancyServiceError::Tenancy` - The reconciling catalog read
    ///   failed.
    pub async fn get_all_tenants_for_app(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<Vec<TenantConfig>, TenancyServiceError> {
        if !identifier.is_default_tenant() {
            return Err(TenancyServiceError::NonDefaultScope("tenant"));
        }
        module.fleet().refresh_if_required().await?;
        Ok(module
            .fleet()
            .snapshot()?
            .into_iter()
            .filter(|tenant| {
                tenant.identifier().connection_uri_domain() == identifier.connection_uri_domain()
                    && tenant.identifier().app_id() == identifier.app_id()
            })
            .collect())
    }

    /// Lists the visible tenants sharing the connection URI domain of
    /// `identifier`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Names the domain; its tenant and app components must
    ///   both be the defaults.
    /// * `module` - The module providing the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TenantConfig>)` - The visible tenants of the domain,
    ///   possibly empty.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::NonDefaultScope` - The identifier carries a
    ///   non-default tenant or app component.
    /// * `TenancyServiceError::Tenancy` - The reconciling catalog read
    ///   failed.
    pub async fn get_all_tenants_for_connection_uri_domain(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<Vec<TenantConfig>, TenancyServiceError> {
        if !identifier.is_default_tenant() || !identifier.is_default_app() {
            return Err(TenancyServiceError::NonDefaultScope("tenant and app"));
        }
        module.fleet().refresh_if_required().await?;
        Ok(module
            .fleet()
            .snapshot()?
            .into_iter()
            .filter(|tenant| {
                tenant.identifier().connection_uri_domain() == identifier.connection_uri_domain()
            })
            .collect())
    }

    /// Lists the full visible snapshot.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Must be the default tenant on all three components.
    /// * `module` - The module providing the fleet.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TenantConfig>)` - Every visible tenant.
    ///
    /// # Errors
    ///
    /// * `TenancyServiceError::NonDefaultScope` - Any identifier component
    ///   is non-default.
    /// * `TenancyServiceError::Tenancy` - The reconciling catalog read
    ///   failed.
    pub async fn get_all_tenants(
        identifier: &TenantIdentifier,
        module: Arc<dyn MultitenancyModule>,
    ) -> Result<Vec<TenantConfig>, TenancyServiceError> {
        if !identifier.is_default() {
            return Err(TenancyServiceError::NonDefaultScope(
                "connection URI domain, app and tenant",
            ));
        }
        module.fleet().refresh_if_required().await?;
        Ok(module.fleet().snapshot()?)
    }
}
