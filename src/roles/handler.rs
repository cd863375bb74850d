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

use crate::common::dto::{HandlerResult, STATUS_OK, STATUS_UNKNOWN_ROLE};
use crate::common::error::{ApiError, message_body};
use crate::multitenancy::identifier::TenantIdentifier;
use crate::roles::RolesModule;
use crate::roles::service::RolesService;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RolePermissionsQuery {
    pub role: Option<String>,
}

pub async fn permissions(
    State(roles_module): State<Arc<dyn RolesModule>>,
    Query(query): Query<RolePermissionsQuery>,
) -> HandlerResult {
    let role = match query.role.as_deref().map(str::trim) {
        Some(role) if !role.is_empty() => role.to_string(),
        _ => {
            return Err(message_body(
                StatusCode::BAD_REQUEST,
                String::from("role is required"),
            ));
        }
    };

    match RolesService::get_permissions(
        &role,
        &TenantIdentifier::default(),
        roles_module.role_permissions_repo(),
    )
    .await
    {
        Ok(Some(permissions)) => Ok(Json(json!({
            "status": STATUS_OK,
            "permissions": permissions,
        }))
        .into_response()),
        Ok(None) => Ok(Json(json!({ "status": STATUS_UNKNOWN_ROLE })).into_response()),
        Err(e) => Err(ApiError(e).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::TenancyError;
    use crate::roles::repository::MockRolePermissionsRepository;
    use crate::roles::routes;
    use crate::roles::tests::MockRolesModule;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app_with_repo(repo: MockRolePermissionsRepository) -> axum::Router {
        let repo = Arc::new(repo);
        let mut roles_module = MockRolesModule::new();
        roles_module
            .expect_role_permissions_repo()
            .returning(move || repo.clone());
        routes::routes(Arc::new(roles_module))
    }

    #[tokio::test]
    async fn existing_role_returns_its_permissions() {
        let mut repo = MockRolePermissionsRepository::new();
        repo.expect_get_permissions_for_role()
            .times(1)
            .withf(|identifier, role| identifier.is_default() && role == "admin")
            .returning(|_, _| Ok(Some(vec!["read".to_string(), "write".to_string()])));

        let response = app_with_repo(repo)
            .oneshot(
                Request::builder()
                    .uri("/role/permissions?role=admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["permissions"], serde_json::json!(["read", "write"]));
    }

    #[tokio::test]
    async fn unknown_role_returns_the_error_status() {
        let mut repo = MockRolePermissionsRepository::new();
        repo.expect_get_permissions_for_role()
            .times(1)
            .returning(|_, _| Ok(None));

        let response = app_with_repo(repo)
            .oneshot(
                Request::builder()
                    .uri("/role/permissions?role=ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "UNKNOWN_ROLE_ERROR");
    }

    #[tokio::test]
    async fn missing_or_blank_role_is_a_bad_request() {
        for uri in ["/role/permissions", "/role/permissions?role=%20%20"] {
            let repo = MockRolePermissionsRepository::new();
            let response = app_with_repo(repo)
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
        }
    }

    #[tokio::test]
    async fn storage_failure_becomes_a_generic_500() {
        let mut repo = MockRolePermissionsRepository::new();
        repo.expect_get_permissions_for_role()
            .times(1)
            .returning(|_, _| Err(TenancyError::Storage(sqlx::Error::PoolClosed)));

        let response = app_with_repo(repo)
            .oneshot(
                Request::builder()
                    .uri("/role/permissions?role=admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
