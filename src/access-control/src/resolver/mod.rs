//! Access resolution
//!
//! Combines live facts from the identity provider and partner directory with
//! the role mappings held in the policy store:
//!
//! 1. Fetch the user by correlation id.
//! 2. Group the user's partner references by partner type and fetch each
//!    group's metadata from the partner directory concurrently.
//! 3. For every partner, role and requested scope, apply the role mapping
//!    filters and union the granted permission groups per scope.
//!
//! Partner fetches are all-or-nothing: the first failing group aborts the
//! remaining fetches and the whole resolution.

pub mod types;

pub use types::{
    AccessContext, IdentityUser, Partner, PartnerRecord, PartnerRef, PartnerType, User,
    UserAccess, UserIdentity,
};

use crate::error::{AccessError, StoreError, UpstreamError};
use crate::store::RoleMappingSource;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

const CORPORATE_IDENTITY_PROVIDER: &str = "AzureAD_VCC";
const INTERNAL_EMAIL_SUFFIX: &str = "@volvocars.com";
const EXTERNAL_EMAIL_SUFFIX: &str = "@volvocars.biz";

/// User type of employees
pub const USER_TYPE_INTERNAL: &str = "INTERNAL";
/// User type of partner staff
pub const USER_TYPE_EXTERNAL: &str = "EXTERNAL";

/// Source of user and partner-association facts
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up a user; `UpstreamError::NotFound` if the id is unknown
    async fn get_user_by_correlation_id(&self, id: &str) -> Result<IdentityUser, UpstreamError>;
}

/// Source of partner metadata
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Batched lookup of partners of one type
    async fn get_partners_by_codes(
        &self,
        codes: &[String],
        partner_type: &str,
    ) -> Result<Vec<PartnerRecord>, UpstreamError>;
}

/// Resolves users' permission groups
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn RoleMappingSource>,
    identity: Arc<dyn IdentityProvider>,
    partners: Arc<dyn PartnerDirectory>,
}

impl AccessResolver {
    /// Create a resolver over a loaded store and the two upstreams
    pub fn new(
        store: Arc<dyn RoleMappingSource>,
        identity: Arc<dyn IdentityProvider>,
        partners: Arc<dyn PartnerDirectory>,
    ) -> Self {
        Self {
            store,
            identity,
            partners,
        }
    }

    /// Permission groups the user holds, per partner, for the requested scopes
    ///
    /// Partners that end up with no permission group are left out.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty scope list, `UserNotFound` when the
    /// identity provider has no such user, otherwise the first upstream or
    /// store failure.
    pub async fn resolve_user_access(
        &self,
        correlation_id: &str,
        scopes: &[String],
    ) -> Result<Vec<UserAccess>, AccessError> {
        if scopes.is_empty() {
            return Err(AccessError::InvalidInput(
                "at least one scope must be requested".to_string(),
            ));
        }

        let user = self.get_user(correlation_id).await?;
        let user_type = detect_user_type(&user.email);
        debug!(
            correlation_id,
            user_type,
            partners = user.partners.len(),
            scopes = scopes.len(),
            "Resolving user access"
        );

        let mut accesses = Vec::new();
        for partner in user.partners {
            let permission_groups =
                evaluate_role_access(self.store.as_ref(), &partner, scopes, user_type)?;
            if permission_groups.is_empty() {
                continue;
            }

            accesses.push(UserAccess {
                context: AccessContext {
                    id: partner.id,
                    partner_type: partner.partner_type,
                    tag: partner.external_code,
                },
                roles: partner.roles,
                permission_groups,
            });
        }

        Ok(accesses)
    }

    /// Fetch a user and enrich their partners from the partner directory
    pub async fn get_user(&self, correlation_id: &str) -> Result<User, AccessError> {
        let identity_user = self
            .identity
            .get_user_by_correlation_id(correlation_id)
            .await
            .map_err(|err| match err {
                UpstreamError::NotFound => AccessError::UserNotFound(correlation_id.to_string()),
                other => AccessError::Upstream(other),
            })?;

        let partners = self.build_partners(&identity_user.partners).await?;

        Ok(User {
            id: identity_user.user_id,
            email: identity_user.email,
            correlation_id: correlation_id_from_identities(&identity_user.user_identities),
            country_code: identity_user.country_code,
            partners,
        })
    }

    async fn build_partners(&self, refs: &[PartnerRef]) -> Result<Vec<Partner>, AccessError> {
        let mut by_id = HashMap::with_capacity(refs.len());
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();

        for partner in refs {
            by_id.insert(partner.partner_id.clone(), partner.clone());
            match groups.iter_mut().find(|(t, _)| *t == partner.partner_type) {
                Some((_, ids)) => ids.push(partner.partner_id.clone()),
                None => groups.push((partner.partner_type.clone(), vec![partner.partner_id.clone()])),
            }
        }

        let by_id = Arc::new(by_id);
        let mut tasks = JoinSet::new();
        let group_count = groups.len();

        for (index, (partner_type, ids)) in groups.into_iter().enumerate() {
            let directory = Arc::clone(&self.partners);
            let by_id = Arc::clone(&by_id);

            tasks.spawn(async move {
                debug!(partner_type = %partner_type, codes = ids.len(), "Fetching partners");
                let records = directory.get_partners_by_codes(&ids, &partner_type).await?;
                let partners = records
                    .into_iter()
                    .map(|record| {
                        let reference = find_reference(&by_id, &partner_type, &record);
                        Partner::merge(&partner_type, record, reference)
                    })
                    .collect::<Vec<_>>();
                Ok::<_, UpstreamError>((index, partners))
            });
        }

        let mut fetched: Vec<Option<Vec<Partner>>> = vec![None; group_count];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, partners))) => fetched[index] = Some(partners),
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(AccessError::Upstream(err));
                }
                Err(err) => {
                    tasks.abort_all();
                    return Err(AccessError::Join(err.to_string()));
                }
            }
        }

        Ok(fetched.into_iter().flatten().flatten().collect())
    }
}

fn find_reference<'a>(
    by_id: &'a HashMap<String, PartnerRef>,
    partner_type: &str,
    record: &PartnerRecord,
) -> Option<&'a PartnerRef> {
    match PartnerType::from_raw(partner_type) {
        PartnerType::Parma => by_id.get(&record.external_code),
        PartnerType::Nsc => by_id.get(&record.id),
        PartnerType::None => None,
    }
}

/// Permission groups granted to a partner across the requested scopes
///
/// A missing role mapping contributes nothing; any other store failure aborts.
pub fn evaluate_role_access(
    store: &dyn RoleMappingSource,
    partner: &Partner,
    scopes: &[String],
    user_type: &str,
) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
    let mut permission_groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for role in &partner.roles {
        for scope in scopes {
            let role_mapping = match store.get_role_mapping(scope, role) {
                Ok(role_mapping) => role_mapping,
                Err(StoreError::RoleMappingNotFound { .. }) => continue,
                Err(err) => return Err(err),
            };

            for mapping in &role_mapping.mapping {
                if !mapping
                    .filter
                    .matches(&partner.market, user_type, &partner.partner_type)
                {
                    continue;
                }

                let granted = permission_groups.entry(scope.clone()).or_default();
                for group in &mapping.permission_groups {
                    if !granted.contains(group) {
                        granted.push(group.clone());
                    }
                }
            }
        }
    }

    // A matching rule may grant nothing
    permission_groups.retain(|_, groups| !groups.is_empty());
    Ok(permission_groups)
}

/// Classify a user by email domain; unknown domains yield an empty type
pub fn detect_user_type(email: &str) -> &'static str {
    if email.ends_with(INTERNAL_EMAIL_SUFFIX) {
        USER_TYPE_INTERNAL
    } else if email.ends_with(EXTERNAL_EMAIL_SUFFIX) {
        USER_TYPE_EXTERNAL
    } else {
        ""
    }
}

/// Local part of the first corporate account name, empty if malformed
fn correlation_id_from_identities(identities: &[UserIdentity]) -> String {
    identities
        .iter()
        .find(|identity| identity.provider == CORPORATE_IDENTITY_PROVIDER)
        .and_then(|identity| identity.account_name.split_once('@'))
        .map(|(local, _)| local.to_string())
        .unwrap_or_default()
}
