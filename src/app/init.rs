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

use crate::app::config::AppConfig;
use crate::common::{ConfigProvider, DefaultAppState};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init_subscriber() {
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(Level::INFO).finish(),
    )
    .expect("setting default subscriber failed");
}

pub async fn init_default_app() -> Result<(Arc<AppConfig>, Router)> {
    let app_state = Arc::new(DefaultAppState::new().await?);
    app_state.bootstrap().await?;
    Ok((
        app_state.config(),
        Router::new().nest(
            "/recipe",
            Router::new()
                .merge(crate::multitenancy::routes::routes(app_state.clone()))
                .merge(crate::roles::routes::routes(app_state.clone()))
                .layer(TraceLayer::new_for_http()),
        ),
    ))
}
