//! Enumerates a mount's hierarchy through a `SecretLister` into a `TreeNode` tree.
//! The walk uses an explicit work stack; very deep hierarchies do not grow the call stack.

use serde::Serialize;
use tracing::{debug, warn};

use super::{DepthLimit, TreeNode};
use crate::backend::SecretLister;
use crate::cancel::CancelToken;
use crate::error::{AuditError, AuditResult, IssueScope, RefreshIssue};
use crate::policy::pattern::SEPARATOR;

/// Result of one enumeration: the tree, its secret leaves in pre-order,
/// and the subtrees that failed to list.
#[derive(Debug, Clone, Serialize)]
pub struct SecretTree {
    pub root: TreeNode,
    pub leaves: Vec<String>,
    pub issues: Vec<RefreshIssue>,
}

impl SecretTree {
    /// The root itself could not be listed.
    pub fn root_failed(&self) -> bool {
        self.issues.iter().any(|i| i.scope == IssueScope::Subtree(listing_dir(&self.root.absolute_path)))
    }
}

struct Slot {
    node: TreeNode,
    secret: bool,
    children: Vec<usize>,
}

fn listing_dir(path: &str) -> String {
    if path.ends_with(SEPARATOR) { path.to_string() } else { format!("{}{}", path, SEPARATOR) }
}

/// Build the tree below `root`. `NotFound` anywhere means no children; any other listing
/// error empties only that subtree and is returned as an issue. Only cancellation fails.
pub async fn build_tree<L: SecretLister>(
    lister: &L,
    root: &str,
    mount: &str,
    depth: DepthLimit,
    cancel: &CancelToken,
) -> AuditResult<SecretTree> {
    let mut arena: Vec<Slot> = vec![Slot { node: TreeNode::root(root), secret: false, children: Vec::new() }];
    let mut pending: Vec<(usize, DepthLimit)> = vec![(0, depth)];
    let mut issues: Vec<RefreshIssue> = Vec::new();

    while let Some((idx, remaining)) = pending.pop() {
        cancel.check()?;
        let Some(below) = remaining.descend() else { continue };
        let dir = listing_dir(&arena[idx].node.absolute_path);
        let names = match lister.list_children(&dir, mount).await {
            Ok(names) => names,
            Err(AuditError::NotFound { .. }) => {
                debug!(target: "secretpaths", "nothing stored at {} in {}", dir, mount);
                continue;
            }
            Err(e) => {
                warn!(target: "secretpaths", "listing {} in {} failed, subtree left empty: {}", dir, mount, e);
                issues.push(RefreshIssue::new(IssueScope::Subtree(dir), &e));
                continue;
            }
        };
        let depth_below = arena[idx].node.depth + 1;
        for name in names {
            let child_idx = arena.len();
            if let Some(dir_name) = name.strip_suffix(SEPARATOR).map(str::to_string) {
                let path = format!("{}{}", dir, dir_name);
                arena.push(Slot { node: TreeNode::new(path, dir_name, depth_below), secret: false, children: Vec::new() });
                pending.push((child_idx, below));
            } else {
                let path = format!("{}{}", dir, name);
                arena.push(Slot { node: TreeNode::new(path, name, depth_below), secret: true, children: Vec::new() });
            }
            arena[idx].children.push(child_idx);
        }
    }

    let leaves = collect_leaves(&arena);
    let root = assemble(arena);
    debug!(target: "secretpaths", "enumerated {} nodes, {} secrets under {}", root.node_count(), leaves.len(), root.absolute_path);
    Ok(SecretTree { root, leaves, issues })
}

fn collect_leaves(arena: &[Slot]) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![0usize];
    while let Some(i) = stack.pop() {
        let slot = &arena[i];
        if slot.secret {
            out.push(slot.node.absolute_path.clone());
        }
        stack.extend(slot.children.iter().rev());
    }
    out
}

/// Children always sit at higher arena indices than their parent, so a reverse sweep
/// finishes every child before its parent takes it.
fn assemble(arena: Vec<Slot>) -> TreeNode {
    let mut built: Vec<Option<TreeNode>> = Vec::with_capacity(arena.len());
    let mut links: Vec<Vec<usize>> = Vec::with_capacity(arena.len());
    for slot in arena {
        built.push(Some(slot.node));
        links.push(slot.children);
    }
    for i in (0..built.len()).rev() {
        let children: Vec<TreeNode> = links[i].iter().filter_map(|c| built[*c].take()).collect();
        if let Some(node) = built[i].as_mut() {
            node.children = children;
        }
    }
    built.into_iter().next().flatten().unwrap_or_else(|| TreeNode::root("/"))
}
