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

use axum::response::Response;

/// Handler return type: both arms are already-rendered responses, the error
/// arm produced by the module's error-to-wire mapping.
pub type HandlerResult = Result<Response, Response>;

pub const STATUS_OK: &str = "OK";
pub const STATUS_TENANT_NOT_FOUND: &str = "TENANT_NOT_FOUND_ERROR";
pub const STATUS_UNKNOWN_ROLE: &str = "UNKNOWN_ROLE_ERROR";
