//! Access resolution over a loaded policy tree
//!
//! Upstream collaborators are in-process fakes.

mod common;

use access_control::error::{AccessError, UpstreamError};
use access_control::resolver::{
    AccessResolver, IdentityProvider, IdentityUser, PartnerDirectory, PartnerRecord, PartnerRef,
    UserIdentity,
};
use access_control::PolicyLoader;
use async_trait::async_trait;
use common::fleet_tree;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

struct StaticIdentity(IdentityUser);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn get_user_by_correlation_id(&self, id: &str) -> Result<IdentityUser, UpstreamError> {
        if id == "jdoe" {
            Ok(self.0.clone())
        } else {
            Err(UpstreamError::NotFound)
        }
    }
}

struct StaticDirectory(HashMap<String, Vec<PartnerRecord>>);

#[async_trait]
impl PartnerDirectory for StaticDirectory {
    async fn get_partners_by_codes(
        &self,
        _codes: &[String],
        partner_type: &str,
    ) -> Result<Vec<PartnerRecord>, UpstreamError> {
        Ok(self.0.get(partner_type).cloned().unwrap_or_default())
    }
}

fn nsc_user(email: &str) -> IdentityUser {
    IdentityUser {
        user_id: "u-1".into(),
        email: email.into(),
        country_code: "SE".into(),
        partners: vec![PartnerRef {
            partner_id: "p-1".into(),
            partner_type: "NSC".into(),
            is_primary: true,
            roles: vec!["admin".into()],
        }],
        user_identities: vec![UserIdentity {
            provider: "AzureAD_VCC".into(),
            provider_user_id: "1".into(),
            account_name: "jdoe@volvocars.com".into(),
        }],
    }
}

fn nsc_directory(market: &str) -> StaticDirectory {
    StaticDirectory(HashMap::from([(
        "NSC".to_string(),
        vec![PartnerRecord {
            id: "p-1".into(),
            name: "Volvo Car Sverige".into(),
            market: market.into(),
            active: true,
            external_code: "SE001".into(),
            ..Default::default()
        }],
    )]))
}

async fn resolver_for(market: &str) -> AccessResolver {
    let tree = fleet_tree();
    let store = Arc::new(PolicyLoader::new(tree.root()).load().await.unwrap());
    AccessResolver::new(
        store,
        Arc::new(StaticIdentity(nsc_user("jane.doe@volvocars.com"))),
        Arc::new(nsc_directory(market)),
    )
}

fn fleet() -> Vec<String> {
    vec!["fleet".to_string()]
}

#[tokio::test]
async fn test_end_to_end_grant() {
    let resolver = resolver_for("SE").await;

    let accesses = assert_ok!(resolver.resolve_user_access("jdoe", &fleet()).await);
    assert_eq!(accesses.len(), 1);
    assert_eq!(accesses[0].context.id, "p-1");
    assert_eq!(accesses[0].context.tag, "SE001");
    assert_eq!(accesses[0].roles, vec!["admin"]);
    assert_eq!(
        accesses[0].permission_groups,
        BTreeMap::from([("fleet".to_string(), vec!["manage_fleet".to_string()])])
    );
}

#[tokio::test]
async fn test_end_to_end_market_mismatch() {
    let resolver = resolver_for("DE").await;

    let accesses = assert_ok!(resolver.resolve_user_access("jdoe", &fleet()).await);
    assert!(accesses.is_empty());
}

#[tokio::test]
async fn test_unknown_user() {
    let resolver = resolver_for("SE").await;

    let err = assert_err!(resolver.resolve_user_access("ghost", &fleet()).await);
    assert!(matches!(err, AccessError::UserNotFound(_)));
}

#[tokio::test]
async fn test_user_view() {
    let resolver = resolver_for("NO").await;

    let user = assert_ok!(resolver.get_user("jdoe").await);
    assert_eq!(user.correlation_id, "jdoe");
    assert_eq!(user.partners[0].market, "NO");
    assert!(user.partners[0].primary);

    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["cdsid"], "jdoe");
    assert_eq!(json["partners"][0]["type"], "NSC");
    assert_eq!(json["partners"][0]["parma_partner_code"], "SE001");
}

// ============================================================================
// FILTER PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_grant_follows_market_filter(market in "[A-Z]{2}") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let accesses = runtime.block_on(async {
            resolver_for(&market)
                .await
                .resolve_user_access("jdoe", &fleet())
                .await
                .unwrap()
        });

        let expected = market == "SE" || market == "NO";
        prop_assert_eq!(accesses.len(), usize::from(expected));
    }
}
