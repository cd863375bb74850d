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
use crate::multitenancy::fleet::TenantFleet;
use crate::multitenancy::repository::{CatalogRepository, UserPoolRepository};
use std::sync::Arc;

pub(crate) mod dto;
pub(crate) mod fleet;
mod handler;
pub(crate) mod identifier;
pub(crate) mod model;
pub(crate) mod repository;
pub(crate) mod routes;
pub(crate) mod service;
#[cfg(test)]
pub(crate) mod testsupport;

/// Seam between the control plane's operations and the process state that
/// backs them.
pub trait MultitenancyModule: Send + Sync {
    fn catalog_repo(&self) -> Arc<dyn CatalogRepository>;
    fn user_pool_repo(&self) -> Arc<dyn UserPoolRepository>;
    fn fleet(&self) -> Arc<TenantFleet>;
}

impl MultitenancyModule for DefaultAppState {
    fn catalog_repo(&self) -> Arc<dyn CatalogRepository> {
        self.catalog.clone()
    }
    fn user_pool_repo(&self) -> Arc<dyn UserPoolRepository> {
        self.user_pool.clone()
    }
    fn fleet(&self) -> Arc<TenantFleet> {
        self.fleet.clone()
    }
}
