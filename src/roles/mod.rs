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

use crate::common::DefaultAppState;
use crate::roles::repository::RolePermissionsRepository;
use std::sync::Arc;

mod handler;
pub(crate) mod repository;
pub(crate) mod routes;
mod service;

pub trait RolesModule: Send + Sync {
    fn role_permissions_repo(&self) -> Arc<dyn RolePermissionsRepository>;
}

impl RolesModule for DefaultAppState {
    fn role_permissions_repo(&self) -> Arc<dyn RolePermissionsRepository> {
        self.role_permissions.clone()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use mockall::mock;

    mock!(
        pub RolesModule {}
        impl RolesModule for RolesModule {
            fn role_permissions_repo(&self) -> Arc<dyn RolePermissionsRepository>;
        }
    );
}
