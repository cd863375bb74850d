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

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    MultiTenancy,
}

/// Feature gate read from the `[features]` section of the configuration.
/// With `multi_tenancy` disabled, only the default tenant is served.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    multi_tenancy: bool,
}

impl FeatureFlags {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::MultiTenancy => self.multi_tenancy,
        }
    }

    pub fn with_enabled(mut self, feature: Feature) -> Self {
        match feature {
            Feature::MultiTenancy => self.multi_tenancy = true,
        }
        self
    }
}
