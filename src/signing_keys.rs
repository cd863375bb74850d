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
use crate::common::services::generate_string_csprng;
use crate::multitenancy::identifier::TenantIdentifier;
use crate::multitenancy::model::TenantRuntimeConfig;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

const SIGNING_KEY_MATERIAL_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningKeyPurpose {
    AccessToken,
    RefreshToken,
    Jwt,
}

/// One piece of key material with its validity window. `expiry` is
/// `created_at` plus the owning manager's update interval; a key past its
/// expiry is still readable for verification but no longer used for minting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

/// Mints and rotates the key material of one purpose for one tenant.
///
/// A manager starts with a single freshly generated key. Rotation appends;
/// older keys stay listed so outstanding tokens remain verifiable until the
/// recipe engines drop them.
pub struct SigningKeyManager {
    purpose: SigningKeyPurpose,
    algorithm: Algorithm,
    update_interval: Duration,
    keys: RwLock<Vec<SigningKey>>,
}

fn parse_algorithm(name: &str) -> TenancyResult<Algorithm> {
    // Key material is a random secret string, so only the HMAC family is
    // accepted here.
    match name {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(TenancyError::UnsupportedJwtSigningAlgorithm(
            other.to_string(),
        )),
    }
}

impl SigningKeyManager {
    pub fn new(
        purpose: SigningKeyPurpose,
        update_interval_hours: u64,
        algorithm: &str,
    ) -> TenancyResult<Self> {
        let update_interval = Duration::hours(update_interval_hours as i64);
        let manager = Self {
            purpose,
            algorithm: parse_algorithm(algorithm)?,
            update_interval,
            keys: RwLock::new(Vec::new()),
        };
        manager.append_key(Utc::now())?;
        Ok(manager)
    }

    fn append_key(&self, now: DateTime<Utc>) -> TenancyResult<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        keys.push(SigningKey {
            value: generate_string_csprng(SIGNING_KEY_MATERIAL_LENGTH),
            created_at: now,
            expiry: now + self.update_interval,
        });
        Ok(())
    }

    pub fn purpose(&self) -> SigningKeyPurpose {
        self.purpose
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn get_all_keys(&self) -> TenancyResult<Vec<SigningKey>> {
        let keys = self
            .keys
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(keys.clone())
    }

    /// The newest key, used for minting.
    pub fn latest_key(&self) -> TenancyResult<SigningKey> {
        let keys = self
            .keys
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        keys.last()
            .cloned()
            .ok_or_else(|| TenancyError::DbInit("signing key manager holds no keys".to_string()))
    }

    /// Appends a new key when the newest one has passed its expiry.
    /// Invoked by the key-rotation cron.
    pub fn maybe_rotate(&self, now: DateTime<Utc>) -> TenancyResult<bool> {
        let due = self.latest_key()?.expiry <= now;
        if due {
            self.append_key(now)?;
        }
        Ok(due)
    }

    /// Handle for token signing with the newest key.
    pub fn encoding_key(&self) -> TenancyResult<EncodingKey> {
        Ok(EncodingKey::from_secret(
            self.latest_key()?.value.as_bytes(),
        ))
    }
}

/// The per-tenant manager triple handed out by the resource fleet.
#[derive(Clone)]
pub struct SigningKeyManagers {
    pub access_token: Arc<SigningKeyManager>,
    pub refresh_token: Arc<SigningKeyManager>,
    pub jwt: Arc<SigningKeyManager>,
}

impl SigningKeyManagers {
    fn from_runtime_config(runtime_config: &TenantRuntimeConfig) -> TenancyResult<Self> {
        Ok(Self {
            access_token: Arc::new(SigningKeyManager::new(
                SigningKeyPurpose::AccessToken,
                runtime_config.access_token_signing_key_update_interval,
                &runtime_config.jwt_signing_algorithm,
            )?),
            refresh_token: Arc::new(SigningKeyManager::new(
                SigningKeyPurpose::RefreshToken,
                runtime_config.refresh_token_signing_key_update_interval,
                &runtime_config.jwt_signing_algorithm,
            )?),
            jwt: Arc::new(SigningKeyManager::new(
                SigningKeyPurpose::Jwt,
                runtime_config.jwt_signing_key_update_interval,
                &runtime_config.jwt_signing_algorithm,
            )?),
        })
    }
}

/// Registry of manager triples keyed by tenant identifier, aligned with the
/// visible tenant set on every reconcile.
pub struct SigningKeyRegistry {
    managers: RwLock<std::collections::HashMap<TenantIdentifier, SigningKeyManagers>>,
}

impl SigningKeyRegistry {
    pub fn new() -> Self {
        Self {
            managers: RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Ensures a manager triple exists for every listed tenant and destroys
    /// the triples of tenants no longer listed. Existing triples are kept
    /// untouched so key material survives reconciles.
    pub fn load_all(
        &self,
        tenants: &[(TenantIdentifier, Arc<TenantRuntimeConfig>)],
    ) -> TenancyResult<()> {
        let desired: HashSet<&TenantIdentifier> =
            tenants.iter().map(|(identifier, _)| identifier).collect();
        let mut guard = self
            .managers
            .write()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        guard.retain(|identifier, _| desired.contains(identifier));
        for (identifier, runtime_config) in tenants {
            if !guard.contains_key(identifier) {
                guard.insert(
                    identifier.clone(),
                    SigningKeyManagers::from_runtime_config(runtime_config)?,
                );
            }
        }
        Ok(())
    }

    pub fn get(&self, identifier: &TenantIdentifier) -> TenancyResult<Option<SigningKeyManagers>> {
        let guard = self
            .managers
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(guard.get(identifier).cloned())
    }

    pub fn contains(&self, identifier: &TenantIdentifier) -> TenancyResult<bool> {
        let guard = self
            .managers
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(guard.contains_key(identifier))
    }
}

impl Default for SigningKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Hourly cron job rotating every tenant's managers whose newest key has
/// passed its expiry.
pub struct SigningKeyRotationJob {
    fleet: Arc<crate::multitenancy::fleet::TenantFleet>,
}

impl SigningKeyRotationJob {
    pub fn new(fleet: Arc<crate::multitenancy::fleet::TenantFleet>) -> Self {
        Self { fleet }
    }
}

#[async_trait::async_trait]
impl crate::cron::CronJob for SigningKeyRotationJob {
    fn name(&self) -> &'static str {
        "rotate-signing-keys"
    }

    fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(60 * 60)
    }

    async fn run(&self, tenants: &[TenantIdentifier]) -> TenancyResult<()> {
        let now = Utc::now();
        for identifier in tenants {
            let managers = self.fleet.signing_key_managers(identifier)?;
            for manager in [
                &managers.access_token,
                &managers.refresh_token,
                &managers.jwt,
            ] {
                if manager.maybe_rotate(now)? {
                    tracing::info!(tenant = %identifier, purpose = ?manager.purpose(), "signing key rotated");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multitenancy::model::CoreConfig;
    use pretty_assertions::assert_eq;

    fn runtime_config(access_interval_hours: u64) -> Arc<TenantRuntimeConfig> {
        let mut core_config = CoreConfig::default();
        core_config.set(
            crate::multitenancy::model::ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL,
            serde_json::json!(access_interval_hours),
        );
        Arc::new(TenantRuntimeConfig::try_from(&core_config).unwrap())
    }

    #[test]
    fn new_manager_starts_with_one_key() {
        let manager = SigningKeyManager::new(SigningKeyPurpose::AccessToken, 168, "HS256").unwrap();
        let keys = manager.get_all_keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].value.len(), SIGNING_KEY_MATERIAL_LENGTH);
        assert_eq!(keys[0].expiry - keys[0].created_at, Duration::hours(168));
    }

    #[test]
    fn managers_produce_distinct_key_material() {
        let a = SigningKeyManager::new(SigningKeyPurpose::AccessToken, 168, "HS256").unwrap();
        let b = SigningKeyManager::new(SigningKeyPurpose::AccessToken, 168, "HS256").unwrap();
        assert_ne!(
            a.latest_key().unwrap().value,
            b.latest_key().unwrap().value
        );
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let result = SigningKeyManager::new(SigningKeyPurpose::Jwt, 720, "RS256");
        assert!(matches!(
            result,
            Err(TenancyError::UnsupportedJwtSigningAlgorithm(name)) if name == "RS256"
        ));
    }

    #[test]
    fn rotation_appends_only_when_due() {
        let manager = SigningKeyManager::new(SigningKeyPurpose::Jwt, 1, "HS256").unwrap();
        let now = Utc::now();
        assert!(!manager.maybe_rotate(now).unwrap());
        assert!(manager.maybe_rotate(now + Duration::hours(2)).unwrap());
        assert_eq!(manager.get_all_keys().unwrap().len(), 2);
        assert_eq!(
            manager.latest_key().unwrap().created_at,
            now + Duration::hours(2)
        );
    }

    #[test]
    fn registry_creates_keeps_and_destroys_triples() {
        let registry = SigningKeyRegistry::new();
        let default_identifier = TenantIdentifier::default();
        let custom = TenantIdentifier::new(Some("c1"), None, None);

        registry
            .load_all(&[
                (default_identifier.clone(), runtime_config(168)),
                (custom.clone(), runtime_config(200)),
            ])
            .unwrap();
        let first = registry.get(&custom).unwrap().unwrap();

        // Reloading the same set keeps the same manager instances.
        registry
            .load_all(&[
                (default_identifier.clone(), runtime_config(168)),
                (custom.clone(), runtime_config(200)),
            ])
            .unwrap();
        let second = registry.get(&custom).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first.access_token, &second.access_token));

        registry
            .load_all(&[(default_identifier.clone(), runtime_config(168))])
            .unwrap();
        assert!(!registry.contains(&custom).unwrap());
        assert!(registry.contains(&default_identifier).unwrap());
    }

    #[test]
    fn triple_uses_the_tenant_intervals() {
        let managers = SigningKeyManagers::from_runtime_config(&runtime_config(200)).unwrap();
        assert_eq!(managers.access_token.update_interval(), Duration::hours(200));
        assert_eq!(
            managers.refresh_token.update_interval(),
            Duration::hours(
                crate::multitenancy::model::DEFAULT_REFRESH_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_HOURS
                    as i64
            )
        );
        assert_eq!(managers.jwt.algorithm(), Algorithm::HS256);
        assert!(managers.jwt.encoding_key().is_ok());
    }
}
