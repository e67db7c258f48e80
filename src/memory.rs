//! In-memory secret store implementing the collaborator traits.
//! Secret paths and policies keep insertion order, which is the listing order.
//! Listing failures and a full outage can be injected.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::backend::{PolicySource, SecretLister};
use crate::error::{AuditError, AuditResult};
use crate::policy::pattern::SEPARATOR;

/// On-disk fixture:
/// `{"mounts": {"secret": ["team/db", "app"]}, "policies": {"ops": {"path": {..}}}, "failing_paths": {"secret": ["/team/"]}}`.
/// A policy value may be a JSON document or a string holding the raw document text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub mounts: serde_json::Map<String, JsonValue>,
    #[serde(default)]
    pub policies: serde_json::Map<String, JsonValue>,
    #[serde(default)]
    pub failing_paths: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct Inner {
    mounts: HashMap<String, Vec<String>>,
    policies: Vec<(String, Vec<u8>)>,
    failing: HashSet<(String, String)>,
    unavailable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

fn normalize_dir(path: &str) -> String {
    let trimmed = path.trim_start_matches(SEPARATOR);
    if trimmed.is_empty() || trimmed.ends_with(SEPARATOR) { trimmed.to_string() } else { format!("{}{}", trimmed, SEPARATOR) }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_fixture(fixture: StoreFixture) -> anyhow::Result<Self> {
        let store = MemoryStore::new();
        for (mount, paths) in fixture.mounts.into_iter() {
            let paths: Vec<String> = serde_json::from_value(paths)
                .with_context(|| format!("mount {} must list secret paths", mount))?;
            for p in paths { store.put_secret(&mount, &p); }
        }
        for (name, doc) in fixture.policies.into_iter() {
            let bytes = match doc {
                JsonValue::String(text) => text.into_bytes(),
                other => serde_json::to_vec(&other)?,
            };
            store.put_policy(&name, bytes);
        }
        for (mount, paths) in fixture.failing_paths.into_iter() {
            for p in paths { store.fail_listing(&mount, &p); }
        }
        Ok(store)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let fixture: StoreFixture = serde_json::from_str(text).context("invalid store fixture")?;
        Self::from_fixture(fixture)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading store fixture {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Add a secret at `path` (relative to the mount; a leading `/` is ignored).
    pub fn put_secret(&self, mount: &str, path: &str) {
        let p = path.trim_start_matches(SEPARATOR).to_string();
        if p.is_empty() || p.ends_with(SEPARATOR) { return; }
        let mut g = self.inner.write();
        let list = g.mounts.entry(mount.to_string()).or_default();
        if !list.contains(&p) { list.push(p); }
    }

    /// Insert or replace a policy document; replacement keeps the original position.
    pub fn put_policy(&self, name: &str, document: impl Into<Vec<u8>>) {
        let document = document.into();
        let mut g = self.inner.write();
        match g.policies.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = document,
            None => g.policies.push((name.to_string(), document)),
        }
    }

    pub fn fail_listing(&self, mount: &str, path: &str) {
        self.inner.write().failing.insert((mount.to_string(), normalize_dir(path)));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().unavailable = unavailable;
    }

    pub fn secret_count(&self, mount: &str) -> usize {
        self.inner.read().mounts.get(mount).map(|m| m.len()).unwrap_or(0)
    }

    fn children_of(&self, path: &str, mount: &str) -> AuditResult<Vec<String>> {
        let g = self.inner.read();
        if g.unavailable {
            return Err(AuditError::backend(path, "store unavailable"));
        }
        let dir = normalize_dir(path);
        if g.failing.contains(&(mount.to_string(), dir.clone())) {
            return Err(AuditError::backend(path, "listing failed"));
        }
        let Some(secrets) = g.mounts.get(mount) else {
            return Err(AuditError::not_found(path));
        };
        let mut out: Vec<String> = Vec::new();
        for secret in secrets.iter() {
            let Some(rest) = secret.strip_prefix(dir.as_str()) else { continue };
            let name = match rest.find(SEPARATOR) {
                Some(i) => &rest[..=i],
                None => rest,
            };
            if !name.is_empty() && !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
        if out.is_empty() { Err(AuditError::not_found(path)) } else { Ok(out) }
    }
}

impl SecretLister for MemoryStore {
    async fn list_children(&self, path: &str, mount: &str) -> AuditResult<Vec<String>> {
        self.children_of(path, mount)
    }
}

impl PolicySource for MemoryStore {
    async fn list_policies(&self) -> AuditResult<Vec<String>> {
        let g = self.inner.read();
        if g.unavailable {
            return Err(AuditError::backend("sys/policies/acl", "store unavailable"));
        }
        Ok(g.policies.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn read_policy_document(&self, name: &str) -> AuditResult<Vec<u8>> {
        let g = self.inner.read();
        if g.unavailable {
            return Err(AuditError::backend(format!("sys/policies/acl/{}", name), "store unavailable"));
        }
        g.policies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| AuditError::not_found(format!("sys/policies/acl/{}", name)))
    }
}
