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

use crate::common::error::TenancyResult;
use crate::multitenancy::fleet::TenantFleet;
use crate::multitenancy::identifier::TenantIdentifier;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RolePermissionsRepository: Send + Sync {
    /// The permissions of `role` inside the identified tenant's user pool,
    /// or `None` when the role does not exist there.
    async fn get_permissions_for_role(
        &self,
        identifier: &TenantIdentifier,
        role: &str,
    ) -> TenancyResult<Option<Vec<String>>>;
}

pub struct RolePermissionsStore {
    fleet: Arc<TenantFleet>,
}

impl RolePermissionsStore {
    pub fn new(fleet: Arc<TenantFleet>) -> Self {
        Self { fleet }
    }
}

#[async_trait]
impl RolePermissionsRepository for RolePermissionsStore {
    async fn get_permissions_for_role(
        &self,
        identifier: &TenantIdentifier,
        role: &str,
    ) -> TenancyResult<Option<Vec<String>>> {
        let pool = self.fleet.user_pool(identifier)?;
        let role_found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM roles WHERE role = $1")
            .bind(role)
            .fetch_optional(&pool)
            .await?;
        if role_found.is_none() {
            return Ok(None);
        }
        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permission
            FROM role_permissions
            WHERE role = $1
            ORDER BY permission
            "#,
        )
        .bind(role)
        .fetch_all(&pool)
        .await?;
        Ok(Some(permissions))
    }
}
