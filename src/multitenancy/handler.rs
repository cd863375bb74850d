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

use crate::common::dto::{HandlerResult, STATUS_OK, STATUS_TENANT_NOT_FOUND};
use crate::multitenancy::MultitenancyModule;
use crate::multitenancy::dto::{
    AssociateRoleRequest, AssociateUserRequest, CreateOrUpdateTenantRequest, PublicTenant,
    TenantIdentifierParams,
};
use crate::multitenancy::identifier::TenantIdentifier;
use crate::multitenancy::model::TenantConfig;
use crate::multitenancy::service::TenancyService;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde_json::json;
use std::sync::Arc;

pub async fn create_or_update(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Json(payload): Json<CreateOrUpdateTenantRequest>,
) -> HandlerResult {
    let tenant = TenantConfig::from(&payload);
    match TenancyService::add_or_update(&tenant, module).await {
        Ok(created_new) => Ok(Json(json!({
            "status": STATUS_OK,
            "createdNew": created_new,
        }))
        .into_response()),
        Err(e) => Err(e.into_response()),
    }
}

pub async fn get(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Query(params): Query<TenantIdentifierParams>,
) -> HandlerResult {
    let identifier = TenantIdentifier::from(&params);
    match TenancyService::get_tenant_info(&identifier, module).await {
        Ok(Some(tenant)) => Ok(Json(json!({
            "status": STATUS_OK,
            "tenant": PublicTenant::from(tenant),
        }))
        .into_response()),
        Ok(None) => Ok(Json(json!({ "status": STATUS_TENANT_NOT_FOUND })).into_response()),
        Err(e) => Err(e.into_response()),
    }
}

pub async fn remove(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Json(params): Json<TenantIdentifierParams>,
) -> HandlerResult {
    let identifier = TenantIdentifier::from(&params);
    match TenancyService::delete_tenant(&identifier, module).await {
        Ok(did_exist) => Ok(Json(json!({
            "status": STATUS_OK,
            "didExist": did_exist,
        }))
        .into_response()),
        Err(e) => Err(e.into_response()),
    }
}

/// Lists tenants at the scope named by the query: an app when `appId` is
/// given, a connection URI domain when only `connectionUriDomain` is given,
/// otherwise the full visible snapshot.
pub async fn list(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Query(params): Query<TenantIdentifierParams>,
) -> HandlerResult {
    let identifier = TenantIdentifier::from(&params);
    let result = if params.app_id.is_some() {
        TenancyService::get_all_tenants_for_app(&identifier, module).await
    } else if params.connection_uri_domain.is_some() {
        TenancyService::get_all_tenants_for_connection_uri_domain(&identifier, module).await
    } else {
        TenancyService::get_all_tenants(&identifier, module).await
    };
    match result {
        Ok(tenants) => Ok(Json(json!({
            "status": STATUS_OK,
            "tenants": tenants
                .into_iter()
                .map(PublicTenant::from)
                .collect::<Vec<_>>(),
        }))
        .into_response()),
        Err(e) => Err(e.into_response()),
    }
}

pub async fn remove_app(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Json(params): Json<TenantIdentifierParams>,
) -> HandlerResult {
    let identifier = TenantIdentifier::from(&params);
    match TenancyService::delete_app(&identifier, module).await {
        Ok(()) => Ok(Json(json!({ "status": STATUS_OK })).into_response()),
        Err(e) => Err(e.into_response()),
    }
}

pub async fn remove_connection_uri_domain(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Json(params): Json<TenantIdentifierParams>,
) -> HandlerResult {
    let identifier = TenantIdentifier::from(&params);
    match TenancyService::delete_connection_uri_domain(&identifier, module).await {
        Ok(()) => Ok(Json(json!({ "status": STATUS_OK })).into_response()),
        Err(e) => Err(e.into_response()),
    }
}

pub async fn associate_user(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Json(payload): Json<AssociateUserRequest>,
) -> HandlerResult {
    let source = TenantIdentifier::from(&payload.source);
    match TenancyService::add_user_id_to_tenant(
        &source,
        payload.user_id,
        payload.new_tenant_id.as_deref(),
        module,
    )
    .await
    {
        Ok(()) => Ok(Json(json!({ "status": STATUS_OK })).into_response()),
        Err(e) => Err(e.into_response()),
    }
}

pub async fn associate_role(
    State(module): State<Arc<dyn MultitenancyModule>>,
    Json(payload): Json<AssociateRoleRequest>,
) -> HandlerResult {
    let source = TenantIdentifier::from(&payload.source);
    match TenancyService::add_role_to_tenant(
        &source,
        &payload.role,
        payload.new_tenant_id.as_deref(),
        module,
    )
    .await
    {
        Ok(()) => Ok(Json(json!({ "status": STATUS_OK })).into_response()),
        Err(e) => Err(e.into_response()),
    }
}
