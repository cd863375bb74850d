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

use crate::roles::RolesModule;
use crate::roles::handler::permissions;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;

pub fn routes(roles_module: Arc<dyn RolesModule>) -> Router {
    Router::new().nest(
        "/role",
        Router::new()
            .route("/permissions", get(permissions))
            .with_state(roles_module),
    )
}
