//! Shared fixtures: policy trees written into temporary directories

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMAS: [(&str, &str); 4] = [
    ("client.yaml", include_str!("../../schema/client.yaml")),
    ("scope.yaml", include_str!("../../schema/scope.yaml")),
    ("role-mapping.yaml", include_str!("../../schema/role-mapping.yaml")),
    ("permission-groups.yaml", include_str!("../../schema/permission-groups.yaml")),
];

/// Policy directory tree under a temporary root
pub struct PolicyTree {
    dir: TempDir,
}

impl PolicyTree {
    /// Tree with an empty `clients/` and two global roles
    pub fn new() -> Self {
        let tree = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fs::create_dir_all(tree.root().join("clients")).unwrap();
        fs::create_dir_all(tree.root().join("scopes")).unwrap();
        tree.write(
            "config/roles.yaml",
            "roles:\n  - id: admin\n    name: Administrator\n  - id: viewer\n    name: Viewer\n",
        );
        tree
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> &Self {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    pub fn client(&self, id: &str) -> &Self {
        self.write(
            &format!("clients/{id}/client.yaml"),
            &format!("client:\n  id: {id}\n  name: Client {id}\n  whitelisted_domains: [{id}.example.com]\n"),
        )
    }

    pub fn scope(&self, key: &str) -> &Self {
        self.write(
            &format!("scopes/{key}/scope.yaml"),
            &format!("scope:\n  key: {key}\n  label: Scope {key}\n"),
        )
    }

    pub fn permission_groups(&self, scope: &str, keys: &[&str]) -> &Self {
        let mut yaml = String::from("permission_groups:\n");
        for key in keys {
            yaml.push_str(&format!("  - key: {key}\n    label: {key}\n"));
        }
        self.write(&format!("scopes/{scope}/permission-groups.yaml"), &yaml)
    }

    /// Role mapping with a single unfiltered rule
    pub fn role_mapping(&self, scope: &str, file: &str, role: &str, groups: &[&str]) -> &Self {
        self.write(
            &format!("scopes/{scope}/role-mapping/{file}"),
            &format!(
                "role:\n  id: {role}\n  mapping:\n    - permission_groups: [{}]\n",
                groups.join(", ")
            ),
        )
    }

    /// Copy the bundled JSON Schemas into `config/schema`
    pub fn schemas(&self) -> &Self {
        for (name, contents) in SCHEMAS {
            self.write(&format!("config/schema/{name}"), contents);
        }
        self
    }
}

/// Scope "fleet": role "admin" gets `manage_fleet` for NSC partners in SE or NO
pub fn fleet_tree() -> PolicyTree {
    let tree = PolicyTree::new();
    tree.client("web")
        .scope("fleet")
        .permission_groups("fleet", &["manage_fleet", "view_fleet"])
        .write(
            "scopes/fleet/role-mapping/admin.yaml",
            r#"role:
  id: admin
  mapping:
    - filter:
        market: [SE, NO]
        partner_type: [NSC]
      permission_groups: [manage_fleet]
"#,
        );
    tree
}
