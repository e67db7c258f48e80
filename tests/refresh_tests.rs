//! Refresh integration tests: a whole cycle against in-memory store fixtures,
//! covering isolated failures, refresh-level aborts and the served views.

use std::time::Duration;

use secretpaths::{
    AuditConfig, AuditError, AuditResult, Auditor, CancelToken, IssueScope, MemoryStore, PolicySource, SecretLister,
};

const FIXTURE: &str = r#"{
    "mounts": {"secret": ["team/db/password", "team/db/user", "team/api", "app", "private/key"]},
    "policies": {
        "root": {"path": {"*": {"capabilities": ["sudo"]}}},
        "everyone": {"path": {"secret/*": {"capabilities": ["read", "list"]}, "secret/private/key": {"capabilities": ["deny"]}}},
        "team-db": {"path": {"secret/team/db/*": {"capabilities": ["read"]}}},
        "apps": {"path": {"secret/+": {"capabilities": ["read"]}}}
    }
}"#;

fn config() -> AuditConfig {
    AuditConfig { workers: 2, refresh_timeout_ms: 5_000, ..AuditConfig::default() }
}

fn auditor(fixture: &str) -> Auditor<MemoryStore> {
    Auditor::new(MemoryStore::from_json(fixture).unwrap(), config())
}

#[tokio::test]
async fn full_refresh_produces_every_view() {
    let snap = auditor(FIXTURE).refresh(&CancelToken::new()).await.unwrap();
    assert_eq!(snap.mount, "secret");
    assert!(snap.issues.is_empty(), "unexpected issues: {:?}", snap.issues);

    let names: Vec<&str> = snap.policies.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["everyone", "team-db", "apps"]);

    assert_eq!(
        snap.leaf_paths,
        vec!["secret/team/db/password", "secret/team/db/user", "secret/team/api", "secret/app", "secret/private/key"]
    );
    assert_eq!(snap.graph.prefix, "/");
    assert_eq!(snap.graph.children.len(), 3);
    assert_eq!(snap.tree.node_count(), 9);

    let level = snap.level(1).unwrap();
    let prefixes: Vec<&str> = level.children.iter().map(|c| c.prefix.as_str()).collect();
    assert_eq!(prefixes, vec!["team", "app", "private/key"]);
    assert!(snap.level(4).is_none());
}

#[tokio::test]
async fn annotation_follows_policy_evaluation() {
    let snap = auditor(FIXTURE).refresh(&CancelToken::new()).await.unwrap();
    let get = |p: &str| snap.policies_for(p).map(|s| s.iter().cloned().collect::<Vec<_>>());
    assert_eq!(get("secret/team/db/password"), Some(vec!["everyone".to_string(), "team-db".to_string()]));
    assert_eq!(get("secret/app"), Some(vec!["apps".to_string(), "everyone".to_string()]));
    // exact deny in "everyone"; nothing else covers it
    assert_eq!(get("secret/private/key"), None);
    assert_eq!(get("secret/unknown"), None);

    // every leaf appears exactly once in the annotated list
    assert_eq!(snap.annotation.secrets.len(), snap.leaf_paths.len());
    for s in snap.annotation.secrets.iter() {
        let expected: Vec<String> = snap
            .policies
            .iter()
            .filter(|p| p.evaluate(&s.path))
            .map(|p| p.name().to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(s.policies, expected);
    }
}

#[tokio::test]
async fn bad_policies_are_skipped_and_reported() {
    let fixture = r#"{
        "mounts": {"secret": ["a"]},
        "policies": {
            "good": {"path": {"secret/a": {"capabilities": ["read"]}}},
            "garbled": "path \"secret/a\" {",
            "bad-glob": {"path": {"secret/*/x": {"capabilities": ["read"]}}}
        }
    }"#;
    let snap = auditor(fixture).refresh(&CancelToken::new()).await.unwrap();
    let names: Vec<&str> = snap.policies.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["good"]);
    assert_eq!(snap.issues.len(), 2);
    assert_eq!(snap.issues[0].scope, IssueScope::Policy("garbled".into()));
    assert_eq!(snap.issues[0].code, "malformed_policy_document");
    assert_eq!(snap.issues[1].scope, IssueScope::Policy("bad-glob".into()));
    assert_eq!(snap.issues[1].code, "invalid_pattern");
    assert!(snap.policies_for("secret/a").is_some());
}

#[tokio::test]
async fn excluded_policies_are_never_loaded() {
    let a = auditor(FIXTURE);
    let loaded = a.load_policies(&CancelToken::new()).await.unwrap();
    assert!(loaded.policies.iter().all(|p| p.name() != "root"));

    let mut cfg = config();
    cfg.excluded_policies.clear();
    let a = Auditor::new(MemoryStore::from_json(FIXTURE).unwrap(), cfg);
    let loaded = a.load_policies(&CancelToken::new()).await.unwrap();
    assert_eq!(loaded.policies[0].name(), "root");
}

#[tokio::test]
async fn failing_subtree_yields_a_partial_snapshot() {
    let a = auditor(FIXTURE);
    a.store().fail_listing("secret", "/team/");
    let snap = a.refresh(&CancelToken::new()).await.unwrap();
    assert_eq!(snap.leaf_paths, vec!["secret/app", "secret/private/key"]);
    assert_eq!(snap.issues.len(), 1);
    assert_eq!(snap.issues[0].scope, IssueScope::Subtree("/team/".into()));
    assert!(snap.tree.children[0].is_leaf());
}

#[tokio::test]
async fn unavailable_store_is_an_outage() {
    let a = auditor(FIXTURE);
    a.store().set_unavailable(true);
    let err = a.refresh(&CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, AuditError::Outage { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn unlistable_root_is_an_outage() {
    let a = auditor(FIXTURE);
    a.store().fail_listing("secret", "/");
    let err = a.refresh(&CancelToken::new()).await.unwrap_err();
    assert_eq!(err.code_str(), "outage");
}

#[tokio::test]
async fn empty_mount_is_an_empty_snapshot() {
    let mut cfg = config();
    cfg.mount = "kv".into();
    let a = Auditor::new(MemoryStore::from_json(FIXTURE).unwrap(), cfg);
    let snap = a.refresh(&CancelToken::new()).await.unwrap();
    assert!(snap.tree.is_leaf());
    assert!(snap.leaf_paths.is_empty());
    assert!(snap.annotation.index.is_empty());
}

#[tokio::test]
async fn cancelled_refresh_publishes_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = auditor(FIXTURE).refresh(&cancel).await.unwrap_err();
    assert_eq!(err, AuditError::Cancelled);
}

#[tokio::test]
async fn depth_cap_trims_views_but_not_annotation() {
    let mut cfg = config();
    cfg.max_depth = 1;
    let a = Auditor::new(MemoryStore::from_json(FIXTURE).unwrap(), cfg);
    let snap = a.refresh(&CancelToken::new()).await.unwrap();
    assert_eq!(snap.tree.max_depth(), 1);
    assert!(snap.graph.children.iter().all(|c| c.children.is_empty()));
    assert_eq!(snap.leaf_paths.len(), 5);
    assert_eq!(
        snap.policies_for("secret/team/db/password").map(|s| s.len()),
        Some(2),
        "secrets below the cap are still audited"
    );
    assert!(snap.issues.is_empty());
}

#[tokio::test]
async fn unqualified_leaf_paths() {
    let mut cfg = config();
    cfg.qualify_leaf_paths = false;
    let a = Auditor::new(MemoryStore::from_json(FIXTURE).unwrap(), cfg);
    let snap = a.refresh(&CancelToken::new()).await.unwrap();
    assert_eq!(snap.leaf_paths[3], "/app");
    // mount-prefixed patterns no longer line up with bare tree paths
    assert!(snap.annotation.index.is_empty());
}

struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SecretLister for SlowStore {
    async fn list_children(&self, path: &str, mount: &str) -> AuditResult<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_children(path, mount).await
    }
}

impl PolicySource for SlowStore {
    async fn list_policies(&self) -> AuditResult<Vec<String>> {
        self.inner.list_policies().await
    }

    async fn read_policy_document(&self, name: &str) -> AuditResult<Vec<u8>> {
        self.inner.read_policy_document(name).await
    }
}

#[tokio::test]
async fn deadline_discards_the_refresh() {
    let store = SlowStore { inner: MemoryStore::from_json(FIXTURE).unwrap(), delay: Duration::from_secs(5) };
    let cfg = AuditConfig { refresh_timeout_ms: 50, ..config() };
    let err = Auditor::new(store, cfg).refresh(&CancelToken::new()).await.unwrap_err();
    assert_eq!(err, AuditError::DeadlineExceeded { after_ms: 50 });
}

#[tokio::test]
async fn snapshot_serializes_for_consumers() {
    let snap = auditor(FIXTURE).refresh(&CancelToken::new()).await.unwrap();
    let v = serde_json::to_value(&snap).unwrap();
    assert_eq!(v["mount"], "secret");
    assert!(v["generated_at"].is_string());
    assert_eq!(v["tree"]["path"], "/");
    assert_eq!(v["graph"]["prefix"], "/");
    assert_eq!(v["policies"][0]["name"], "everyone");
    assert!(v["annotation"]["index"]["secret/app"].is_array());
}
