//! Refresh configuration. Defaults, then an optional JSON file, then environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tree::DepthLimit;

pub const ENV_KV_ENGINE: &str = "VAULT_KV_ENGINE";
pub const ENV_MAX_DEPTH: &str = "SECRETPATHS_MAX_DEPTH";
pub const ENV_WORKERS: &str = "SECRETPATHS_WORKERS";
pub const ENV_REFRESH_TIMEOUT_MS: &str = "SECRETPATHS_REFRESH_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// KV mount whose hierarchy is enumerated.
    pub mount: String,
    pub root_path: String,
    /// Depth cap for the tree and graph views; -1 means unlimited.
    /// Annotation always covers every secret.
    pub max_depth: i64,
    /// Annotator worker-pool size.
    pub workers: usize,
    pub refresh_timeout_ms: u64,
    /// Policies never loaded (the store's root policy).
    pub excluded_policies: Vec<String>,
    /// Annotate `<mount>/<path>` rather than the bare tree path.
    pub qualify_leaf_paths: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mount: "secret".to_string(),
            root_path: "/".to_string(),
            max_depth: -1,
            workers: default_workers(),
            refresh_timeout_ms: 30_000,
            excluded_policies: vec!["root".to_string()],
            qualify_leaf_paths: true,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl AuditConfig {
    /// Read `path` as JSON; a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged and ignored.
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(v) = lookup(ENV_KV_ENGINE) {
            if !v.trim().is_empty() { self.mount = v.trim().to_string(); }
        }
        if let Some(v) = lookup(ENV_MAX_DEPTH) {
            match v.trim().parse::<i64>() {
                Ok(d) => self.max_depth = d,
                Err(_) => warn!(target: "secretpaths", "ignoring {}={:?}: not an integer", ENV_MAX_DEPTH, v),
            }
        }
        if let Some(v) = lookup(ENV_WORKERS) {
            match v.trim().parse::<usize>() {
                Ok(w) => self.workers = w,
                Err(_) => warn!(target: "secretpaths", "ignoring {}={:?}: not a count", ENV_WORKERS, v),
            }
        }
        if let Some(v) = lookup(ENV_REFRESH_TIMEOUT_MS) {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.refresh_timeout_ms = ms,
                Err(_) => warn!(target: "secretpaths", "ignoring {}={:?}: not milliseconds", ENV_REFRESH_TIMEOUT_MS, v),
            }
        }
    }

    pub fn depth_limit(&self) -> DepthLimit { DepthLimit::from_sentinel(self.max_depth) }

    pub fn effective_workers(&self) -> usize { self.workers.max(1) }

    pub fn refresh_timeout(&self) -> Duration { Duration::from_millis(self.refresh_timeout_ms) }

    pub fn is_excluded(&self, policy: &str) -> bool {
        self.excluded_policies.iter().any(|p| p == policy)
    }

    /// Path handed to the annotator for a tree leaf.
    pub fn annotation_path(&self, leaf: &str) -> String {
        if !self.qualify_leaf_paths {
            return leaf.to_string();
        }
        format!("{}/{}", self.mount.trim_end_matches('/'), leaf.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let c = AuditConfig::default();
        assert_eq!(c.mount, "secret");
        assert_eq!(c.depth_limit(), DepthLimit::Unlimited);
        assert!(c.is_excluded("root"));
        assert!(c.effective_workers() >= 1);
        assert_eq!(c.refresh_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn file_values_and_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = AuditConfig::load_or_default(&tmp.path().join("none.json")).unwrap();
        assert_eq!(missing, AuditConfig::default());

        let p = tmp.path().join("audit.json");
        std::fs::write(&p, r#"{"mount": "kv", "max_depth": 3, "workers": 0}"#).unwrap();
        let c = AuditConfig::load_or_default(&p).unwrap();
        assert_eq!(c.mount, "kv");
        assert_eq!(c.depth_limit(), DepthLimit::Levels(3));
        assert_eq!(c.effective_workers(), 1);
        assert_eq!(c.root_path, "/");

        std::fs::write(&p, "{ not json").unwrap();
        assert!(AuditConfig::load_or_default(&p).is_err());
    }

    #[test]
    fn overrides_win_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_KV_ENGINE, "kv2"),
            (ENV_MAX_DEPTH, "two"),
            (ENV_WORKERS, "8"),
            (ENV_REFRESH_TIMEOUT_MS, "1500"),
        ]);
        let mut c = AuditConfig::default();
        c.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.mount, "kv2");
        assert_eq!(c.max_depth, -1);
        assert_eq!(c.workers, 8);
        assert_eq!(c.refresh_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn annotation_paths_are_mount_qualified() {
        let mut c = AuditConfig::default();
        assert_eq!(c.annotation_path("/team/db"), "secret/team/db");
        c.qualify_leaf_paths = false;
        assert_eq!(c.annotation_path("/team/db"), "/team/db");
    }
}
