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
use crate::multitenancy::identifier::TenantIdentifier;
use crate::roles::repository::RolePermissionsRepository;
use std::sync::Arc;

pub struct RolesService;

impl RolesService {
    /// Permission lookup for the role, resolved against the default tenant
    /// unless a surrounding resource distributor routed the request
    /// elsewhere. Read-only: never mutates, never retries.
    pub async fn get_permissions(
        role: &str,
        identifier: &TenantIdentifier,
        repo: Arc<dyn RolePermissionsRepository>,
    ) -> TenancyResult<Option<Vec<String>>> {
        repo.get_permissions_for_role(identifier, role).await
    }
}
