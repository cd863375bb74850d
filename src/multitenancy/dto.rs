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

use crate::multitenancy::identifier::TenantIdentifier;
use crate::multitenancy::model::{
    CoreConfig, EmailPasswordConfig, PasswordlessConfig, TenantConfig, ThirdPartyConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier components as they appear in request bodies and query strings.
/// Absent or empty components resolve to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantIdentifierParams {
    pub connection_uri_domain: Option<String>,
    pub app_id: Option<String>,
    pub tenant_id: Option<String>,
}

impl From<&TenantIdentifierParams> for TenantIdentifier {
    fn from(params: &TenantIdentifierParams) -> Self {
        TenantIdentifier::new(
            params.connection_uri_domain.as_deref(),
            params.app_id.as_deref(),
            params.tenant_id.as_deref(),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateTenantRequest {
    #[serde(flatten)]
    pub identifier: TenantIdentifierParams,
    #[serde(default)]
    pub email_password_enabled: bool,
    #[serde(default)]
    pub third_party_enabled: bool,
    #[serde(default)]
    pub third_party_providers: Vec<Value>,
    #[serde(default)]
    pub passwordless_enabled: bool,
    #[serde(default)]
    pub core_config: Map<String, Value>,
}

impl From<&CreateOrUpdateTenantRequest> for TenantConfig {
    fn from(request: &CreateOrUpdateTenantRequest) -> Self {
        TenantConfig::new(
            TenantIdentifier::from(&request.identifier),
            EmailPasswordConfig {
                enabled: request.email_password_enabled,
            },
            ThirdPartyConfig {
                enabled: request.third_party_enabled,
                providers: request.third_party_providers.clone(),
            },
            PasswordlessConfig {
                enabled: request.passwordless_enabled,
            },
            CoreConfig::new(request.core_config.clone()),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateUserRequest {
    #[serde(flatten)]
    pub source: TenantIdentifierParams,
    pub user_id: Uuid,
    pub new_tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateRoleRequest {
    #[serde(flatten)]
    pub source: TenantIdentifierParams,
    pub role: String,
    pub new_tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTenant {
    pub connection_uri_domain: String,
    pub app_id: String,
    pub tenant_id: String,
    pub email_password_enabled: bool,
    pub third_party_enabled: bool,
    pub third_party_providers: Vec<Value>,
    pub passwordless_enabled: bool,
    pub core_config: Map<String, Value>,
}

impl From<TenantConfig> for PublicTenant {
    fn from(tenant: TenantConfig) -> Self {
        Self {
            connection_uri_domain: tenant.identifier().connection_uri_domain().to_string(),
            app_id: tenant.identifier().app_id().to_string(),
            tenant_id: tenant.identifier().tenant_id().to_string(),
            email_password_enabled: tenant.email_password.enabled,
            third_party_enabled: tenant.third_party.enabled,
            third_party_providers: tenant.third_party.providers,
            passwordless_enabled: tenant.passwordless.enabled,
            core_config: tenant.core_config.as_map().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn create_request_maps_to_a_tenant_config() {
        let request: CreateOrUpdateTenantRequest = serde_json::from_value(json!({
            "connectionUriDomain": "c1",
            "tenantId": "t1",
            "emailPasswordEnabled": true,
            "coreConfig": {"access_token_signing_key_update_interval": 200}
        }))
        .unwrap();
        let tenant = TenantConfig::from(&request);
        assert_eq!(
            tenant.identifier(),
            &TenantIdentifier::new(Some("c1"), None, Some("t1"))
        );
        assert!(tenant.email_password.enabled);
        assert!(!tenant.third_party.enabled);
        assert_eq!(
            tenant
                .core_config
                .access_token_signing_key_update_interval()
                .unwrap(),
            200
        );
    }

    #[test]
    fn public_tenant_round_trips_the_identifier() {
        let request: CreateOrUpdateTenantRequest =
            serde_json::from_value(json!({"appId": "a1"})).unwrap();
        let public = PublicTenant::from(TenantConfig::from(&request));
        assert_eq!(public.app_id, "a1");
        assert_eq!(public.tenant_id, "public");
        assert_eq!(public.connection_uri_domain, "");
    }
}
