//! Request-scoped user, partner and access types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// User record as returned by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityUser {
    pub user_id: String,
    pub email: String,
    pub country_code: String,
    pub partners: Vec<PartnerRef>,
    pub user_identities: Vec<UserIdentity>,
}

/// Partner association as known to the identity provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartnerRef {
    pub partner_id: String,
    /// Raw partner type (e.g. "PARMA", "NSC")
    pub partner_type: String,
    pub is_primary: bool,
    pub roles: Vec<String>,
}

/// Account linked to a user at some identity provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserIdentity {
    pub provider: String,
    pub provider_user_id: String,
    pub account_name: String,
}

/// Partner metadata as returned by the partner directory
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartnerRecord {
    pub id: String,
    pub name: String,
    pub distributor_id: String,
    pub market: String,
    pub active: bool,
    /// External partner code, used to match PARMA partners
    #[serde(rename = "parmaPartnerCode")]
    pub external_code: String,
    pub role_code: String,
}

/// Partner type as understood by the partner directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartnerType {
    /// National sales company, matched by partner id
    Nsc,
    /// Retailer/workshop, matched by external partner code
    Parma,
    /// Anything else
    None,
}

impl PartnerType {
    /// Normalise a raw partner type string
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "NSC" => Self::Nsc,
            "PARMA" => Self::Parma,
            _ => Self::None,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nsc => "NSC",
            Self::Parma => "PARMA",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for PartnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User assembled from identity-provider and partner-directory facts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Corporate account name, derived from the user's identities
    #[serde(rename = "cdsid")]
    pub correlation_id: String,
    pub country_code: String,
    pub partners: Vec<Partner>,
}

/// Partner a user acts for, with the roles they hold there
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partner {
    pub id: String,
    pub role_code: String,
    pub name: String,
    /// Partner type as reported by the identity provider
    #[serde(rename = "type")]
    pub partner_type: String,
    pub distributor_id: String,
    #[serde(rename = "parma_partner_code")]
    pub external_code: String,
    pub market: String,
    pub active: bool,
    /// Internal only; not part of the response body
    #[serde(skip)]
    pub primary: bool,
    pub roles: Vec<String>,
}

impl Partner {
    /// Merge a directory record with the identity provider's view of the partner
    pub(crate) fn merge(partner_type: &str, record: PartnerRecord, reference: Option<&PartnerRef>) -> Self {
        let (primary, roles) = reference
            .map(|r| (r.is_primary, r.roles.clone()))
            .unwrap_or_default();

        Self {
            id: record.id,
            role_code: record.role_code,
            name: record.name,
            partner_type: partner_type.to_string(),
            distributor_id: record.distributor_id,
            external_code: record.external_code,
            market: record.market,
            active: record.active,
            primary,
            roles,
        }
    }
}

/// Partner identity attached to an access record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessContext {
    pub id: String,
    #[serde(rename = "type")]
    pub partner_type: String,
    /// External partner code
    pub tag: String,
}

/// Permission groups a user holds through one partner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserAccess {
    pub context: AccessContext,
    pub roles: Vec<String>,
    /// Scope key → granted permission groups
    pub permission_groups: BTreeMap<String, Vec<String>>,
}
