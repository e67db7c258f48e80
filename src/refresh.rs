//! One refresh cycle: load and compile policies, enumerate the secret hierarchy, compress it
//! and annotate every leaf. A refresh either yields a complete `Snapshot` or fails as a whole;
//! isolated policy and subtree failures are carried on the snapshot as issues.
//!
//! Single-flight is the caller's concern; `Auditor` holds no mutable state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotate::{annotate_until, Annotation};
use crate::backend::{JsonPolicyDecoder, PolicyDecoder, PolicySource, SecretLister};
use crate::cancel::CancelToken;
use crate::config::AuditConfig;
use crate::error::{AuditError, AuditResult, IssueScope, RefreshIssue};
use crate::policy::{compile_policy, Policy};
use crate::tree::{build_tree, compress_tree, compress_unbounded, CompressedNode, DepthLimit, SecretTree, TreeNode};

/// Immutable result of one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub mount: String,
    pub policies: Vec<Policy>,
    /// Hierarchy down to the configured depth cap.
    pub tree: TreeNode,
    pub graph: CompressedNode,
    /// Every leaf secret, whatever the depth cap, as annotated
    /// (mount-qualified unless configured otherwise).
    pub leaf_paths: Vec<String>,
    pub annotation: Annotation,
    pub issues: Vec<RefreshIssue>,
}

impl Snapshot {
    /// Depth-bounded compression of the tree; `None` when the tree never reaches `level`.
    pub fn level(&self, level: usize) -> Option<CompressedNode> {
        compress_tree(&self.tree, DepthLimit::Levels(level))
    }

    pub fn policies_for(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.annotation.policies_for(path)
    }
}

/// Loaded policies plus the ones that were skipped.
#[derive(Debug, Clone)]
pub struct LoadedPolicies {
    pub policies: Vec<Policy>,
    pub issues: Vec<RefreshIssue>,
}

pub struct Auditor<S, D = JsonPolicyDecoder> {
    store: S,
    decoder: D,
    config: AuditConfig,
}

impl<S: PolicySource + SecretLister> Auditor<S, JsonPolicyDecoder> {
    pub fn new(store: S, config: AuditConfig) -> Self {
        Auditor { store, decoder: JsonPolicyDecoder, config }
    }
}

impl<S: PolicySource + SecretLister, D: PolicyDecoder> Auditor<S, D> {
    pub fn with_decoder(store: S, decoder: D, config: AuditConfig) -> Self {
        Auditor { store, decoder, config }
    }

    pub fn config(&self) -> &AuditConfig { &self.config }

    pub fn store(&self) -> &S { &self.store }

    /// Every non-excluded policy, compiled, in store order. Failing to list policies at all
    /// is an outage; a policy that cannot be read, decoded or compiled is skipped.
    pub async fn load_policies(&self, cancel: &CancelToken) -> AuditResult<LoadedPolicies> {
        cancel.check()?;
        let names = self
            .store
            .list_policies()
            .await
            .map_err(|e| AuditError::outage(format!("listing policies: {}", e)))?;
        let names: Vec<String> = names.into_iter().filter(|n| !self.config.is_excluded(n)).collect();
        cancel.check()?;

        let documents = join_all(names.iter().map(|n| self.store.read_policy_document(n))).await;
        cancel.check()?;

        let mut policies = Vec::with_capacity(names.len());
        let mut issues = Vec::new();
        for (name, document) in names.into_iter().zip(documents) {
            let compiled = document
                .and_then(|bytes| self.decoder.decode(&name, &bytes))
                .and_then(|raw| compile_policy(name.as_str(), &raw));
            match compiled {
                Ok(policy) => {
                    debug!(target: "secretpaths", "loaded policy {} with {} rules", name, policy.rule_count());
                    policies.push(policy);
                }
                Err(e) => {
                    warn!(target: "secretpaths", "skipping policy {}: {}", name, e);
                    issues.push(RefreshIssue::new(IssueScope::Policy(name), &e));
                }
            }
        }
        Ok(LoadedPolicies { policies, issues })
    }

    /// Enumerate the whole configured mount; the depth cap only applies to the views.
    /// A root that fails to list is an outage.
    pub async fn build_tree(&self, cancel: &CancelToken) -> AuditResult<SecretTree> {
        let tree = build_tree(&self.store, &self.config.root_path, &self.config.mount, DepthLimit::Unlimited, cancel).await?;
        if tree.root_failed() {
            let message = tree.issues.first().map(|i| i.message.clone()).unwrap_or_default();
            return Err(AuditError::outage(format!("listing {} in {}: {}", self.config.root_path, self.config.mount, message)));
        }
        Ok(tree)
    }

    /// Run one refresh under the configured deadline. Work still running when the
    /// deadline fires is cancelled through a child of `cancel`.
    pub async fn refresh(&self, cancel: &CancelToken) -> AuditResult<Snapshot> {
        let deadline = self.config.refresh_timeout();
        let run = cancel.child();
        match tokio::time::timeout(deadline, self.refresh_inner(&run)).await {
            Ok(res) => res,
            Err(_) => {
                run.cancel();
                warn!(target: "secretpaths", "refresh of {} exceeded {:?}, discarded", self.config.mount, deadline);
                Err(AuditError::DeadlineExceeded { after_ms: self.config.refresh_timeout_ms })
            }
        }
    }

    async fn refresh_inner(&self, cancel: &CancelToken) -> AuditResult<Snapshot> {
        let LoadedPolicies { policies, issues: mut all_issues } = self.load_policies(cancel).await?;
        let SecretTree { root: full, leaves, issues } = self.build_tree(cancel).await?;
        all_issues.extend(issues);

        let root = full.truncated(self.config.depth_limit());
        let graph = compress_unbounded(&root);
        let leaf_paths: Vec<String> = leaves.iter().map(|l| self.config.annotation_path(l)).collect();

        let workers = self.config.effective_workers();
        let worker_cancel = cancel.clone();
        let (policies, leaf_paths, annotation) = tokio::task::spawn_blocking(move || {
            let annotation = annotate_until(&leaf_paths, &policies, workers, &worker_cancel);
            (policies, leaf_paths, annotation)
        })
        .await
        .map_err(|e| AuditError::outage(format!("annotation worker failed: {}", e)))?;
        let annotation = annotation?;
        cancel.check()?;

        info!(
            target: "secretpaths",
            "refreshed {}: {} policies, {} nodes, {} secrets, {} reachable, {} issues",
            self.config.mount,
            policies.len(),
            root.node_count(),
            leaf_paths.len(),
            annotation.index.len(),
            all_issues.len()
        );
        Ok(Snapshot {
            generated_at: Utc::now(),
            mount: self.config.mount.clone(),
            policies,
            tree: root,
            graph,
            leaf_paths,
            annotation,
            issues: all_issues,
        })
    }
}
