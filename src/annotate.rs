//! Access annotation: for every leaf secret path, the names of the policies that grant it.
//! Evaluation only reads immutable policies, so paths are split into contiguous chunks and
//! evaluated on scoped worker threads; results are reassembled in input order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::AuditResult;
use crate::policy::Policy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSecret {
    pub path: String,
    /// Sorted, deduplicated policy names.
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// One entry per distinct leaf path, in first-seen order.
    pub secrets: Vec<AnnotatedSecret>,
    /// Paths with at least one granting policy.
    pub index: BTreeMap<String, BTreeSet<String>>,
}

impl Annotation {
    pub fn policies_for(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.index.get(path)
    }
}

fn annotate_one(path: &str, policies: &[Policy]) -> AnnotatedSecret {
    let names: BTreeSet<&str> = policies.iter().filter(|p| p.evaluate(path)).map(Policy::name).collect();
    AnnotatedSecret { path: path.to_string(), policies: names.into_iter().map(str::to_string).collect() }
}

fn annotate_chunk(paths: &[&str], policies: &[Policy], cancel: &CancelToken) -> AuditResult<Vec<AnnotatedSecret>> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        cancel.check()?;
        out.push(annotate_one(p, policies));
    }
    Ok(out)
}

/// Annotate `leaf_paths` against `policies` using up to `workers` threads.
/// The result does not depend on `workers`.
pub fn annotate(leaf_paths: &[String], policies: &[Policy], workers: usize) -> Annotation {
    annotate_until(leaf_paths, policies, workers, &CancelToken::new()).unwrap_or_default()
}

/// As `annotate`, but every worker stops at the next path once `cancel` fires.
pub fn annotate_until(
    leaf_paths: &[String],
    policies: &[Policy],
    workers: usize,
    cancel: &CancelToken,
) -> AuditResult<Annotation> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(leaf_paths.len());
    let unique: Vec<&str> = leaf_paths.iter().map(String::as_str).filter(|p| seen.insert(*p)).collect();

    let workers = workers.max(1).min(unique.len().max(1));
    let secrets = if workers == 1 {
        annotate_chunk(&unique, policies, cancel)?
    } else {
        let chunk = unique.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = unique
                .chunks(chunk)
                .map(|part| scope.spawn(move || annotate_chunk(part, policies, cancel)))
                .collect();
            let mut out = Vec::with_capacity(unique.len());
            for h in handles {
                match h.join() {
                    Ok(part) => out.extend(part?),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            Ok::<_, crate::error::AuditError>(out)
        })?
    };

    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for s in secrets.iter().filter(|s| !s.policies.is_empty()) {
        index.entry(s.path.clone()).or_default().extend(s.policies.iter().cloned());
    }
    tracing::debug!(
        target: "secretpaths",
        "annotated {} paths against {} policies with {} workers; {} reachable",
        secrets.len(), policies.len(), workers, index.len()
    );
    Ok(Annotation { secrets, index })
}
