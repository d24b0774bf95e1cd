//! Policy record types and their on-disk YAML definitions

use serde::{Deserialize, Serialize};

/// OAuth client registered with the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Domains the client may redirect to
    #[serde(default)]
    pub whitelisted_domains: Vec<String>,

    /// Scopes the client depends on, in declaration order
    #[serde(default)]
    pub dependant_scopes: Vec<String>,
}

/// Globally registered role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Named policy domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Unique scope key (e.g. "fleet")
    pub key: String,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Permission groups declared in `permission-groups.yaml`
    #[serde(default)]
    pub permission_groups: Vec<PermissionGroup>,
}

/// Atomic unit of granted capability, owned by a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
    /// Key referenced by role mappings
    pub key: String,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Rules translating one role, within one scope, into permission groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    /// Role the rules apply to
    #[serde(rename = "id")]
    pub role_id: String,

    /// Ordered rule list
    #[serde(default)]
    pub mapping: Vec<Mapping>,
}

/// Single rule within a role mapping
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mapping {
    /// Attribute filter a partner must pass
    #[serde(default)]
    pub filter: Filter,

    /// Permission groups granted when the filter passes
    #[serde(default)]
    pub permission_groups: Vec<String>,
}

/// Three-dimensional attribute filter
///
/// An empty dimension is a wildcard; a populated one requires membership.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Allowed partner markets (e.g. "SE", "NO")
    #[serde(default)]
    pub market: Vec<String>,

    /// Allowed user types ("INTERNAL", "EXTERNAL")
    #[serde(default)]
    pub user_type: Vec<String>,

    /// Allowed partner types ("NSC", "PARMA")
    #[serde(default)]
    pub partner_type: Vec<String>,
}

impl Filter {
    /// Check the filter against a partner's market and type and the user's type
    pub fn matches(&self, market: &str, user_type: &str, partner_type: &str) -> bool {
        dimension_matches(&self.market, market)
            && dimension_matches(&self.user_type, user_type)
            && dimension_matches(&self.partner_type, partner_type)
    }

    /// Whether every dimension is a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.market.is_empty() && self.user_type.is_empty() && self.partner_type.is_empty()
    }
}

fn dimension_matches(allowed: &[String], value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|candidate| candidate == value)
}

// On-disk document wrappers

/// `clients/<dir>/client.yaml`
#[derive(Debug, Deserialize)]
pub(crate) struct ClientDefinition {
    pub client: Client,
}

/// `config/roles.yaml`
#[derive(Debug, Deserialize)]
pub(crate) struct RoleDefinition {
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// `scopes/<dir>/scope.yaml`
#[derive(Debug, Deserialize)]
pub(crate) struct ScopeDefinition {
    pub scope: ScopeHeader,
}

/// Scope fields as written in `scope.yaml`; permission groups live elsewhere
#[derive(Debug, Deserialize)]
pub(crate) struct ScopeHeader {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl From<ScopeHeader> for Scope {
    fn from(header: ScopeHeader) -> Self {
        Self {
            key: header.key,
            label: header.label,
            description: header.description,
            permission_groups: Vec::new(),
        }
    }
}

/// `scopes/<dir>/permission-groups.yaml`
#[derive(Debug, Deserialize)]
pub(crate) struct PermissionGroupDefinition {
    #[serde(default)]
    pub permission_groups: Vec<PermissionGroup>,
}

/// `scopes/<dir>/role-mapping/<file>.yaml`
#[derive(Debug, Deserialize)]
pub(crate) struct RoleMappingDefinition {
    pub role: RoleMapping,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nsc_nordics() -> Filter {
        Filter {
            market: vec!["SE".into(), "NO".into()],
            user_type: vec![],
            partner_type: vec!["NSC".into()],
        }
    }

    #[test]
    fn test_filter_membership() {
        let filter = nsc_nordics();
        assert!(filter.matches("SE", "INTERNAL", "NSC"));
        assert!(filter.matches("NO", "", "NSC"));
        assert!(!filter.matches("DE", "INTERNAL", "NSC"));
        assert!(!filter.matches("SE", "INTERNAL", "PARMA"));
    }

    #[test]
    fn test_wildcard_filter_matches_everything() {
        let filter = Filter::default();
        assert!(filter.is_wildcard());
        assert!(filter.matches("DE", "EXTERNAL", "PARMA"));
        assert!(filter.matches("", "", ""));
    }

    #[test]
    fn test_unclassified_user_fails_populated_user_type() {
        let filter = Filter {
            user_type: vec!["INTERNAL".into()],
            ..Default::default()
        };
        assert!(!filter.matches("SE", "", "NSC"));
    }

    #[test]
    fn test_role_mapping_yaml_shape() {
        let yaml = r#"
role:
  id: admin
  mapping:
    - filter:
        market: [SE, NO]
        partner_type: [NSC]
      permission_groups: [manage_fleet]
    - permission_groups: [view_fleet]
"#;
        let definition: RoleMappingDefinition = serde_yaml::from_str(yaml).unwrap();
        let mapping = definition.role;

        assert_eq!(mapping.role_id, "admin");
        assert_eq!(mapping.mapping.len(), 2);
        assert_eq!(mapping.mapping[0].filter, nsc_nordics());
        assert!(mapping.mapping[1].filter.is_wildcard());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn wildcard_filter_accepts_any_attributes(
                market in "[A-Z]{0,3}",
                user_type in "[A-Z]{0,8}",
                partner_type in "[A-Z]{0,5}",
            ) {
                prop_assert!(Filter::default().matches(&market, &user_type, &partner_type));
            }

            #[test]
            fn populated_dimension_requires_membership(
                allowed in proptest::collection::vec("[A-Z]{2}", 1..5),
                market in "[A-Z]{2}",
            ) {
                let filter = Filter { market: allowed.clone(), ..Default::default() };
                prop_assert_eq!(filter.matches(&market, "", ""), allowed.contains(&market));
            }
        }
    }
}
