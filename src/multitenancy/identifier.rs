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

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub const DEFAULT_CONNECTION_URI_DOMAIN: &str = "";
pub const DEFAULT_APP_ID: &str = "public";
pub const DEFAULT_TENANT_ID: &str = "public";

/// Identifies one tenant inside the three-level hierarchy: a connection URI
/// domain owns apps, an app owns tenants.
///
/// Identifiers are immutable and compared by value over all three components.
/// Construction normalizes absent, empty, or whitespace-only components to
/// the well-known defaults, so `("", None, Some("public"))` and
/// `(None, None, None)` name the same tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantIdentifier {
    connection_uri_domain: String,
    app_id: String,
    tenant_id: String,
}

fn normalize(component: Option<&str>, default: &str) -> String {
    match component {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

impl TenantIdentifier {
    pub fn new(
        connection_uri_domain: Option<&str>,
        app_id: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Self {
        Self {
            connection_uri_domain: normalize(connection_uri_domain, DEFAULT_CONNECTION_URI_DOMAIN),
            app_id: normalize(app_id, DEFAULT_APP_ID),
            tenant_id: normalize(tenant_id, DEFAULT_TENANT_ID),
        }
    }

    pub fn connection_uri_domain(&self) -> &str {
        &self.connection_uri_domain
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Derives the identifier of a sibling tenant under the same app.
    pub fn with_tenant_id(&self, tenant_id: Option<&str>) -> Self {
        Self {
            connection_uri_domain: self.connection_uri_domain.clone(),
            app_id: self.app_id.clone(),
            tenant_id: normalize(tenant_id, DEFAULT_TENANT_ID),
        }
    }

    pub fn is_default_connection_uri_domain(&self) -> bool {
        self.connection_uri_domain == DEFAULT_CONNECTION_URI_DOMAIN
    }

    pub fn is_default_app(&self) -> bool {
        self.app_id == DEFAULT_APP_ID
    }

    pub fn is_default_tenant(&self) -> bool {
        self.tenant_id == DEFAULT_TENANT_ID
    }

    /// True for the `(default, default, default)` identifier that always
    /// exists and can never be soft-deleted.
    pub fn is_default(&self) -> bool {
        self.is_default_connection_uri_domain() && self.is_default_app() && self.is_default_tenant()
    }

    /// Stable tuple rendering used by the catalog row and log lines.
    pub fn as_tuple(&self) -> (&str, &str, &str) {
        (
            &self.connection_uri_domain,
            &self.app_id,
            &self.tenant_id,
        )
    }
}

impl Default for TenantIdentifier {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl Display for TenantIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.connection_uri_domain, self.app_id, self.tenant_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn absent_components_normalize_to_defaults() {
        let identifier = TenantIdentifier::new(None, None, None);
        assert_eq!(identifier.connection_uri_domain(), DEFAULT_CONNECTION_URI_DOMAIN);
        assert_eq!(identifier.app_id(), DEFAULT_APP_ID);
        assert_eq!(identifier.tenant_id(), DEFAULT_TENANT_ID);
        assert!(identifier.is_default());
    }

    #[test]
    fn empty_and_whitespace_components_normalize_to_defaults() {
        let identifier = TenantIdentifier::new(Some(""), Some("   "), Some("\t"));
        assert_eq!(identifier, TenantIdentifier::default());
    }

    #[test]
    fn compared_by_value_over_all_components() {
        let a = TenantIdentifier::new(Some("c1"), None, Some("t1"));
        let b = TenantIdentifier::new(Some("c1"), Some("public"), Some("t1"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&b.with_tenant_id(Some("t2"))));
    }

    #[test]
    fn hierarchy_predicates() {
        let identifier = TenantIdentifier::new(Some("c1"), None, Some("t1"));
        assert!(!identifier.is_default_connection_uri_domain());
        assert!(identifier.is_default_app());
        assert!(!identifier.is_default_tenant());
        assert!(!identifier.is_default());
    }

    #[test]
    fn with_tenant_id_keeps_parent_components() {
        let source = TenantIdentifier::new(Some("c1"), Some("a1"), Some("t1"));
        let target = source.with_tenant_id(Some("t2"));
        assert_eq!(target.connection_uri_domain(), "c1");
        assert_eq!(target.app_id(), "a1");
        assert_eq!(target.tenant_id(), "t2");

        assert_eq!(source.with_tenant_id(None).tenant_id(), DEFAULT_TENANT_ID);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let identifier = TenantIdentifier::new(Some(" c1 "), Some(" a1"), Some("t1 "));
        assert_eq!(identifier.as_tuple(), ("c1", "a1", "t1"));
    }
}
