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

use crate::multitenancy::MultitenancyModule;
use crate::multitenancy::handler::{
    associate_role, associate_user, create_or_update, get as get_tenant, list, remove, remove_app,
    remove_connection_uri_domain,
};
use axum::Router;
use axum::routing::{delete, get, post, put};

use std::sync::Arc;

pub fn routes(multitenancy_module: Arc<dyn MultitenancyModule>) -> Router {
    Router::new().nest(
        "/multitenancy",
        Router::new()
            .route("/tenant", put(create_or_update).get(get_tenant).delete(remove))
            .route("/tenant/list", get(list))
            .route("/tenant/user", post(associate_user))
            .route("/tenant/role", post(associate_role))
            .route("/app", delete(remove_app))
            .route("/connectionuridomain", delete(remove_connection_uri_domain))
            .with_state(multitenancy_module),
    )
}
