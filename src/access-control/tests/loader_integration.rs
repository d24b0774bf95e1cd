//! Policy loader integration tests
//!
//! Conflict detection, failure aggregation across scope tasks, and load
//! determinism under different concurrency limits.

mod common;

use access_control::store::{LoaderConfig, PolicyLoader, PolicyStore};
use access_control::{LoadError, StoreError};
use common::{fleet_tree, PolicyTree};

fn snapshot(store: &PolicyStore) -> Vec<String> {
    let mut entries = Vec::new();
    for client in store.get_clients() {
        entries.push(format!("client:{client:?}"));
    }
    for role in store.get_roles() {
        entries.push(format!("role:{role:?}"));
    }
    for scope in store.get_scopes() {
        for mapping in store.get_role_mappings(&scope.key) {
            entries.push(format!("mapping:{}:{mapping:?}", scope.key));
        }
        entries.push(format!("scope:{scope:?}"));
    }
    entries.sort();
    entries
}

// ============================================================================
// SUCCESSFUL LOADS
// ============================================================================

#[tokio::test]
async fn test_load_fleet_tree() {
    let tree = fleet_tree();
    let store = PolicyLoader::new(tree.root()).load().await.unwrap();

    assert_eq!(store.get_client("web").unwrap().whitelisted_domains, vec!["web.example.com"]);
    assert_eq!(store.get_roles().len(), 2);

    let scope = store.get_scope("fleet").unwrap();
    assert_eq!(scope.label, "Scope fleet");
    assert_eq!(scope.permission_groups.len(), 2);

    let mapping = store.get_role_mapping("fleet", "admin").unwrap();
    assert_eq!(mapping.mapping[0].filter.market, vec!["SE", "NO"]);
    assert_eq!(mapping.mapping[0].permission_groups, vec!["manage_fleet"]);

    assert!(matches!(
        store.get_role_mapping("fleet", "viewer"),
        Err(StoreError::RoleMappingNotFound { .. })
    ));
}

#[tokio::test]
async fn test_prefix_lookup_keeps_similar_scopes_apart() {
    let tree = PolicyTree::new();
    tree.scope("fleet")
        .scope("fleet-ops")
        .role_mapping("fleet", "admin.yaml", "admin", &["manage_fleet"])
        .role_mapping("fleet", "viewer.yaml", "viewer", &["view_fleet"])
        .role_mapping("fleet-ops", "admin.yaml", "admin", &["dispatch"]);

    let store = PolicyLoader::new(tree.root()).load().await.unwrap();

    let mut roles: Vec<String> = store
        .get_role_mappings("fleet")
        .into_iter()
        .map(|m| m.role_id)
        .collect();
    roles.sort();
    assert_eq!(roles, vec!["admin", "viewer"]);

    let ops = store.get_role_mappings("fleet-ops");
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].mapping[0].permission_groups, vec!["dispatch"]);
}

#[tokio::test]
async fn test_load_is_deterministic_across_concurrency_limits() {
    let tree = PolicyTree::new();
    for i in 0..12 {
        let key = format!("scope-{i:02}");
        tree.scope(&key)
            .role_mapping(&key, "admin.yaml", "admin", &["manage"])
            .role_mapping(&key, "viewer.yaml", "viewer", &["view"]);
    }
    tree.client("web").client("mobile");

    let baseline = snapshot(&PolicyLoader::new(tree.root()).load().await.unwrap());
    assert_eq!(baseline.len(), 2 + 2 + 12 + 24);

    for max_concurrency in [1, 2, 5, 16] {
        for _ in 0..3 {
            let loader = PolicyLoader::with_config(tree.root(), LoaderConfig { max_concurrency });
            let store = loader.load().await.unwrap();
            assert_eq!(snapshot(&store), baseline, "max_concurrency = {max_concurrency}");
        }
    }
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_duplicate_role_mapping_aborts_load() {
    let tree = fleet_tree();
    tree.role_mapping("fleet", "admin-copy.yaml", "admin", &["view_fleet"]);

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    assert!(err.is_conflict(), "{err}");
    assert!(err.to_string().contains("scope [fleet] and role [admin]"));
}

#[tokio::test]
async fn test_scope_key_declared_twice_aborts_load() {
    let tree = fleet_tree();
    tree.write("scopes/fleet-copy/scope.yaml", "scope:\n  key: fleet\n  label: Copy\n");

    for max_concurrency in [1, 2, 5] {
        for _ in 0..10 {
            let loader = PolicyLoader::with_config(tree.root(), LoaderConfig { max_concurrency });
            let err = loader.load().await.unwrap_err();
            assert!(err.is_conflict(), "{err}");
            match &err.errors()[..] {
                [LoadError::Scope { source, .. }] => assert!(
                    matches!(source.as_ref(), LoadError::DuplicateScope { key, .. } if key == "fleet"),
                    "{source}"
                ),
                other => panic!("unexpected errors: {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn test_racing_scope_directories_yield_one_failure() {
    let tree = PolicyTree::new();
    for dir in ["fleet-a", "fleet-b"] {
        tree.write(&format!("scopes/{dir}/scope.yaml"), "scope:\n  key: fleet\n  label: Fleet\n")
            .role_mapping(dir, "admin.yaml", "admin", &["manage_fleet"]);
    }

    for max_concurrency in [1, 2, 5] {
        for _ in 0..20 {
            let loader = PolicyLoader::with_config(tree.root(), LoaderConfig { max_concurrency });
            let err = loader.load().await.unwrap_err();
            assert_eq!(err.errors().len(), 1, "{err}");
            assert!(err.is_conflict(), "{err}");
        }
    }
}

#[tokio::test]
async fn test_role_listed_twice_aborts_load() {
    let tree = fleet_tree();
    tree.write(
        "config/roles.yaml",
        "roles:\n  - id: admin\n    name: First\n  - id: admin\n    name: Second\n",
    );

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    assert!(matches!(err, LoadError::DuplicateRole { ref id, .. } if id == "admin"), "{err}");
}

#[tokio::test]
async fn test_client_id_declared_twice_aborts_load() {
    let tree = fleet_tree();
    tree.write(
        "clients/web-legacy/client.yaml",
        "client:\n  id: web\n  name: Legacy web\n",
    );

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    match err {
        LoadError::DuplicateClient { id, path } => {
            assert_eq!(id, "web");
            assert_eq!(path, tree.path("clients/web-legacy/client.yaml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failures_from_every_scope_are_aggregated() {
    let tree = fleet_tree();
    tree.write("scopes/orders/scope.yaml", "scope: [not, a, mapping]\n");
    tree.write("scopes/billing/role-mapping/admin.yaml", "role:\n  id: admin\n");

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    let errors = err.errors();
    assert_eq!(errors.len(), 2, "{err}");
    assert!(errors.iter().all(|e| matches!(e, LoadError::Scope { .. })));

    let rendered = err.to_string();
    assert!(rendered.contains("orders"));
    assert!(rendered.contains("billing"));
}

#[tokio::test]
async fn test_missing_scope_file_is_fatal() {
    let tree = fleet_tree();
    tree.role_mapping("orders", "admin.yaml", "admin", &["create_order"]);

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    match &err.errors()[..] {
        [LoadError::Scope { source, .. }] => assert!(source.is_not_found()),
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_client_is_fatal() {
    let tree = fleet_tree();
    tree.write("clients/broken/client.yaml", "client: {id: [}\n");

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    assert!(matches!(err, LoadError::Malformed { .. }));
}

#[tokio::test]
async fn test_missing_clients_dir_is_fatal() {
    let tree = fleet_tree();
    std::fs::remove_dir_all(tree.path("clients")).unwrap();

    let err = PolicyLoader::new(tree.root()).load().await.unwrap_err();
    assert!(err.is_not_found());
}
