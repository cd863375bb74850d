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
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sqlx::Error;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Errors surfaced by the catalog store, the user-pool stores, and the
/// per-tenant resource loaders.
///
/// The first group is the domain taxonomy callers are expected to match on;
/// the rest carries infrastructure failures through unchanged.
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("tenant already exists: {0}")]
    DuplicateTenant(TenantIdentifier),

    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantIdentifier),

    #[error("tenant or parent app not found in its user pool: {0}")]
    TenantOrAppNotFound(TenantIdentifier),

    #[error("unknown user id: {0}")]
    UnknownUserId(Uuid),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("invalid core config: {0}")]
    InvalidConfig(String),

    #[error("unsupported JWT signing algorithm: {0}")]
    UnsupportedJwtSigningAlgorithm(String),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migrate error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("database init error: {0}")]
    DbInit(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("user pool not found: {0}")]
    UserPoolNotFound(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl TenancyError {
    pub fn is_unique_violation(&self) -> bool {
        if let TenancyError::Storage(sqlxe) = self
            && let Error::Database(database_error) = sqlxe
            && database_error.is_unique_violation()
        {
            return true;
        }
        false
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        if let TenancyError::Storage(sqlxe) = self
            && let Error::Database(database_error) = sqlxe
            && database_error.is_foreign_key_violation()
        {
            return true;
        }
        false
    }
}

pub type TenancyResult<T> = Result<T, TenancyError>;

/// Wire-level rendering of control-plane failures. Domain outcomes the
/// product contract models as statuses keep HTTP 200 with a `status` body;
/// caller mistakes map to 4xx; everything else collapses into a logged 500.
pub struct ApiError(pub TenancyError);

impl From<TenancyError> for ApiError {
    fn from(error: TenancyError) -> Self {
        Self(error)
    }
}

pub(crate) fn status_body(status_code: StatusCode, status: &str) -> Response {
    (status_code, axum::Json(json!({ "status": status }))).into_response()
}

pub(crate) fn message_body(status_code: StatusCode, message: String) -> Response {
    (status_code, axum::Json(json!({ "message": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            TenancyError::UnknownTenant(_) | TenancyError::TenantOrAppNotFound(_) => {
                status_body(StatusCode::OK, "TENANT_NOT_FOUND_ERROR")
            }
            TenancyError::UnknownUserId(_) => status_body(StatusCode::OK, "UNKNOWN_USER_ID_ERROR"),
            TenancyError::UnknownRole(_) => status_body(StatusCode::OK, "UNKNOWN_ROLE_ERROR"),
            TenancyError::DuplicateTenant(identifier) => message_body(
                StatusCode::CONFLICT,
                format!("tenant already exists: {identifier}"),
            ),
            TenancyError::InvalidConfig(reason) => message_body(StatusCode::BAD_REQUEST, reason),
            error => {
                error!("request failed: {error}");
                message_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal error"),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_predicate_is_false_for_non_database_errors() {
        let error = TenancyError::InvalidConfig("x".to_string());
        assert!(!error.is_unique_violation());
        let error = TenancyError::Storage(sqlx::Error::RowNotFound);
        assert!(!error.is_unique_violation());
    }
}
