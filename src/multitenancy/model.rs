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

use crate::common::error::{TenancyError, TenancyResult};
use crate::multitenancy::identifier::TenantIdentifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

pub const DEFAULT_USER_POOL_ID: &str = "default";

pub const ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL: &str =
    "access_token_signing_key_update_interval";
pub const REFRESH_TOKEN_SIGNING_KEY_UPDATE_INTERVAL: &str =
    "refresh_token_signing_key_update_interval";
pub const JWT_SIGNING_KEY_UPDATE_INTERVAL: &str = "jwt_signing_key_update_interval";
pub const JWT_SIGNING_ALGORITHM: &str = "jwt_signing_algorithm";
pub const USER_POOL_ID: &str = "user_pool_id";

/// Interval defaults in hours, applied when a tenant's core config does not
/// override the corresponding key.
pub const DEFAULT_ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS: u64 = 168;
pub const DEFAULT_REFRESH_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS: u64 = 336;
pub const DEFAULT_JWT_SIGNING_KEY_UPDATE_INTERVAL_HOURS: u64 = 720;
pub const DEFAULT_JWT_SIGNING_ALGORITHM: &str = "HS256";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmailPasswordConfig {
    pub enabled: bool,
}

/// Third-party recipe enablement. The provider list is opaque to the control
/// plane; it is stored and handed back to the recipe engines untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThirdPartyConfig {
    pub enabled: bool,
    #[serde(default)]
    pub providers: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PasswordlessConfig {
    pub enabled: bool,
}

/// Structured per-tenant configuration. The map is opaque except for the
/// handful of keys the control plane itself consumes (signing-key intervals
/// and the user-pool selector); everything else is preserved for the
/// per-tenant config loader.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoreConfig(Map<String, Value>);

impl CoreConfig {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn hours_or(&self, key: &str, default: u64) -> TenancyResult<u64> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| TenancyError::InvalidConfig(format!("{key} must be a positive integer"))),
        }
    }

    fn string_or(&self, key: &str, default: &str) -> TenancyResult<String> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(value)) => Ok(value.clone()),
            // Numeric selectors are accepted for convenience; they name a
            // pool id in the [user_pools] table of the core configuration.
            Some(Value::Number(value)) => Ok(value.to_string()),
            Some(_) => Err(TenancyError::InvalidConfig(format!("{key} must be a string"))),
        }
    }

    pub fn access_token_signing_key_update_interval(&self) -> TenancyResult<u64> {
        self.hours_or(
            ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL,
            DEFAULT_ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS,
        )
    }

    pub fn refresh_token_signing_key_update_interval(&self) -> TenancyResult<u64> {
        self.hours_or(
            REFRESH_TOKEN_SIGNING_KEY_UPDATE_INTERVAL,
            DEFAULT_REFRESH_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS,
        )
    }

    pub fn jwt_signing_key_update_interval(&self) -> TenancyResult<u64> {
        self.hours_or(
            JWT_SIGNING_KEY_UPDATE_INTERVAL,
            DEFAULT_JWT_SIGNING_KEY_UPDATE_INTERVAL_HOURS,
        )
    }

    pub fn jwt_signing_algorithm(&self) -> TenancyResult<String> {
        self.string_or(JWT_SIGNING_ALGORITHM, DEFAULT_JWT_SIGNING_ALGORITHM)
    }

    pub fn user_pool_id(&self) -> TenancyResult<String> {
        self.string_or(USER_POOL_ID, DEFAULT_USER_POOL_ID)
    }
}

/// One catalog entry: the identifier plus everything the runtime needs to
/// serve the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    identifier: TenantIdentifier,
    pub email_password: EmailPasswordConfig,
    pub third_party: ThirdPartyConfig,
    pub passwordless: PasswordlessConfig,
    pub core_config: CoreConfig,
    pub app_id_marked_as_deleted: bool,
    pub connection_uri_domain_marked_as_deleted: bool,
}

impl TenantConfig {
    pub fn new(
        identifier: TenantIdentifier,
        email_password: EmailPasswordConfig,
        third_party: ThirdPartyConfig,
        passwordless: PasswordlessConfig,
        core_config: CoreConfig,
    ) -> Self {
        Self {
            identifier,
            email_password,
            third_party,
            passwordless,
            core_config,
            app_id_marked_as_deleted: false,
            connection_uri_domain_marked_as_deleted: false,
        }
    }

    pub fn identifier(&self) -> &TenantIdentifier {
        &self.identifier
    }

    /// A tenant is visible iff neither of its parent soft-delete flags is
    /// set. Only visible tenants are served by the resource fleet.
    pub fn is_visible(&self) -> bool {
        !self.app_id_marked_as_deleted && !self.connection_uri_domain_marked_as_deleted
    }
}

/// Typed snapshot of the core-config keys the control plane consumes.
/// Rebuilt on reconcile; reused between reconciles while the raw core config
/// stays unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantRuntimeConfig {
    raw: CoreConfig,
    pub access_token_signing_key_update_interval: u64,
    pub refresh_token_signing_key_update_interval: u64,
    pub jwt_signing_key_update_interval: u64,
    pub jwt_signing_algorithm: String,
    pub user_pool_id: String,
}

impl TenantRuntimeConfig {
    pub fn raw(&self) -> &CoreConfig {
        &self.raw
    }
}

impl TryFrom<&CoreConfig> for TenantRuntimeConfig {
    type Error = TenancyError;

    fn try_from(core_config: &CoreConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            raw: core_config.clone(),
            access_token_signing_key_update_interval: core_config
                .access_token_signing_key_update_interval()?,
            refresh_token_signing_key_update_interval: core_config
                .refresh_token_signing_key_update_interval()?,
            jwt_signing_key_update_interval: core_config.jwt_signing_key_update_interval()?,
            jwt_signing_algorithm: core_config.jwt_signing_algorithm()?,
            user_pool_id: core_config.user_pool_id()?,
        })
    }
}

/// Raw catalog row; the JSONB columns round-trip the recipe and core
/// configuration without the control plane interpreting them.
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub connection_uri_domain: String,
    pub app_id: String,
    pub tenant_id: String,
    pub email_password_enabled: bool,
    pub third_party_enabled: bool,
    pub third_party_providers: Value,
    pub passwordless_enabled: bool,
    pub core_config: Value,
    pub app_id_marked_as_deleted: bool,
    pub connection_uri_domain_marked_as_deleted: bool,
}

impl TryFrom<TenantRow> for TenantConfig {
    type Error = TenancyError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        let providers = match row.third_party_providers {
            Value::Array(providers) => providers,
            Value::Null => Vec::new(),
            other => {
                return Err(TenancyError::InvalidConfig(format!(
                    "third_party_providers must be an array, got {other}"
                )));
            }
        };
        let core_config = match row.core_config {
            Value::Object(map) => CoreConfig::new(map),
            Value::Null => CoreConfig::default(),
            other => {
                return Err(TenancyError::InvalidConfig(format!(
                    "core_config must be an object, got {other}"
                )));
            }
        };
        Ok(Self {
            identifier: TenantIdentifier::new(
                Some(&row.connection_uri_domain),
                Some(&row.app_id),
                Some(&row.tenant_id),
            ),
            email_password: EmailPasswordConfig {
                enabled: row.email_password_enabled,
            },
            third_party: ThirdPartyConfig {
                enabled: row.third_party_enabled,
                providers,
            },
            passwordless: PasswordlessConfig {
                enabled: row.passwordless_enabled,
            },
            core_config,
            app_id_marked_as_deleted: row.app_id_marked_as_deleted,
            connection_uri_domain_marked_as_deleted: row.connection_uri_domain_marked_as_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tenant(identifier: TenantIdentifier) -> TenantConfig {
        TenantConfig::new(
            identifier,
            EmailPasswordConfig::default(),
            ThirdPartyConfig::default(),
            PasswordlessConfig::default(),
            CoreConfig::default(),
        )
    }

    #[test]
    fn core_config_defaults_apply_when_keys_are_absent() {
        let core_config = CoreConfig::default();
        assert_eq!(
            core_config.access_token_signing_key_update_interval().unwrap(),
            DEFAULT_ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS
        );
        assert_eq!(
            core_config.refresh_token_signing_key_update_interval().unwrap(),
            DEFAULT_REFRESH_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS
        );
        assert_eq!(
            core_config.jwt_signing_key_update_interval().unwrap(),
            DEFAULT_JWT_SIGNING_KEY_UPDATE_INTERVAL_HOURS
        );
        assert_eq!(core_config.user_pool_id().unwrap(), DEFAULT_USER_POOL_ID);
        assert_eq!(
            core_config.jwt_signing_algorithm().unwrap(),
            DEFAULT_JWT_SIGNING_ALGORITHM
        );
    }

    #[test]
    fn core_config_overrides_are_read_back() {
        let mut core_config = CoreConfig::default();
        core_config.set(ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL, json!(200));
        core_config.set(USER_POOL_ID, json!("2"));
        assert_eq!(
            core_config.access_token_signing_key_update_interval().unwrap(),
            200
        );
        assert_eq!(core_config.user_pool_id().unwrap(), "2");
    }

    #[test]
    fn numeric_user_pool_selector_is_accepted() {
        let mut core_config = CoreConfig::default();
        core_config.set(USER_POOL_ID, json!(2));
        assert_eq!(core_config.user_pool_id().unwrap(), "2");
    }

    #[test]
    fn mistyped_interval_is_an_invalid_config_error() {
        let mut core_config = CoreConfig::default();
        core_config.set(ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL, json!("fast"));
        assert!(matches!(
            core_config.access_token_signing_key_update_interval(),
            Err(TenancyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn visibility_requires_both_soft_delete_flags_clear() {
        let mut config = tenant(TenantIdentifier::new(Some("c1"), None, None));
        assert!(config.is_visible());
        config.app_id_marked_as_deleted = true;
        assert!(!config.is_visible());
        config.app_id_marked_as_deleted = false;
        config.connection_uri_domain_marked_as_deleted = true;
        assert!(!config.is_visible());
    }

    #[test]
    fn runtime_config_reads_typed_values() {
        let mut core_config = CoreConfig::default();
        core_config.set(ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL, json!(200));
        core_config.set(USER_POOL_ID, json!("2"));
        let runtime = TenantRuntimeConfig::try_from(&core_config).unwrap();
        assert_eq!(runtime.access_token_signing_key_update_interval, 200);
        assert_eq!(runtime.user_pool_id, "2");
        assert_eq!(runtime.raw(), &core_config);
    }

    #[test]
    fn row_mapping_preserves_opaque_sections() {
        let row = TenantRow {
            connection_uri_domain: "c1".to_string(),
            app_id: "public".to_string(),
            tenant_id: "t1".to_string(),
            email_password_enabled: true,
            third_party_enabled: true,
            third_party_providers: json!([{"thirdPartyId": "google"}]),
            passwordless_enabled: false,
            core_config: json!({"user_pool_id": "2", "custom_flag": true}),
            app_id_marked_as_deleted: false,
            connection_uri_domain_marked_as_deleted: false,
        };
        let config = TenantConfig::try_from(row).unwrap();
        assert_eq!(
            config.identifier(),
            &TenantIdentifier::new(Some("c1"), None, Some("t1"))
        );
        assert!(config.email_password.enabled);
        assert_eq!(config.third_party.providers.len(), 1);
        assert_eq!(
            config.core_config.get("custom_flag"),
            Some(&json!(true))
        );
    }

    #[test]
    fn row_mapping_rejects_malformed_core_config() {
        let row = TenantRow {
            connection_uri_domain: "c1".to_string(),
            app_id: "public".to_string(),
            tenant_id: "t1".to_string(),
            email_password_enabled: false,
            third_party_enabled: false,
            third_party_providers: json!([]),
            passwordless_enabled: false,
            core_config: json!("not an object"),
            app_id_marked_as_deleted: false,
            connection_uri_domain_marked_as_deleted: false,
        };
        assert!(TenantConfig::try_from(row).is_err());
    }
}
