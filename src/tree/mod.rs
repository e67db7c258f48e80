//! Secret hierarchy as an in-memory tree, and its compact renderings.
//!
//! Wire shapes are fixed for existing consumers:
//! - `TreeNode` serializes as `{path, id, name, level, children}`.
//! - `CompressedNode` serializes as `{prefix, children}`, omitting `children` when empty.

pub mod builder;
pub mod compress;

pub use builder::{build_tree, SecretTree};
pub use compress::{compress_tree, compress_unbounded};

use serde::{Deserialize, Serialize};

use crate::policy::pattern::SEPARATOR;

/// Depth cap for enumeration and compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum DepthLimit {
    #[default]
    Unlimited,
    Levels(usize),
}

impl DepthLimit {
    /// Negative values mean unlimited.
    pub fn from_sentinel(v: i64) -> Self {
        if v < 0 { DepthLimit::Unlimited } else { DepthLimit::Levels(v as usize) }
    }

    pub fn as_sentinel(&self) -> i64 {
        match self {
            DepthLimit::Unlimited => -1,
            DepthLimit::Levels(n) => *n as i64,
        }
    }

    /// Limit one level further down; `None` once exhausted.
    pub fn descend(&self) -> Option<DepthLimit> {
        match self {
            DepthLimit::Unlimited => Some(DepthLimit::Unlimited),
            DepthLimit::Levels(0) => None,
            DepthLimit::Levels(n) => Some(DepthLimit::Levels(n - 1)),
        }
    }
}

impl From<i64> for DepthLimit {
    fn from(v: i64) -> Self { DepthLimit::from_sentinel(v) }
}

impl From<DepthLimit> for i64 {
    fn from(d: DepthLimit) -> Self { d.as_sentinel() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(rename = "path")]
    pub absolute_path: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "level")]
    pub depth: usize,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(absolute_path: impl Into<String>, name: impl Into<String>, depth: usize) -> Self {
        let absolute_path = absolute_path.into();
        TreeNode { id: absolute_path.clone(), absolute_path, name: name.into(), depth, children: Vec::new() }
    }

    /// Root node for a listing root; `/` is named `/`, anything else by its last segment.
    pub fn root(path: &str) -> Self {
        let trimmed = path.trim_end_matches(SEPARATOR);
        let name = match trimmed.rsplit(SEPARATOR).next() {
            Some(seg) if !seg.is_empty() => seg.to_string(),
            _ => path.to_string(),
        };
        TreeNode::new(path, name, 0)
    }

    pub fn is_leaf(&self) -> bool { self.children.is_empty() }

    /// Number of nodes including `self`.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            count += 1;
            stack.extend(n.children.iter());
        }
        count
    }

    /// Copy with every node more than `limit` levels below `self` cut away.
    pub fn truncated(&self, limit: DepthLimit) -> TreeNode {
        let mut out = self.clone();
        let DepthLimit::Levels(levels) = limit else { return out };
        let horizon = self.depth + levels;
        let mut stack = vec![&mut out];
        while let Some(n) = stack.pop() {
            if n.depth >= horizon {
                n.children.clear();
            } else {
                stack.extend(n.children.iter_mut());
            }
        }
        out
    }

    pub fn max_depth(&self) -> usize {
        let mut deepest = self.depth;
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            deepest = deepest.max(n.depth);
            stack.extend(n.children.iter());
        }
        deepest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedNode {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CompressedNode>,
}

impl CompressedNode {
    pub fn leaf(prefix: impl Into<String>) -> Self {
        CompressedNode { prefix: prefix.into(), children: Vec::new() }
    }

    /// Reinterpret as a tree: each prefix becomes a node name, paths are the joined prefixes.
    pub fn to_tree(&self) -> TreeNode {
        self.to_tree_at(&self.prefix, 0)
    }

    fn to_tree_at(&self, path: &str, depth: usize) -> TreeNode {
        let mut node = TreeNode::new(path, self.prefix.clone(), depth);
        node.children = self
            .children
            .iter()
            .map(|c| c.to_tree_at(&join_segment(path, &c.prefix), depth + 1))
            .collect();
        node
    }
}

/// Join with a single separator between `base` and `segment`.
pub fn join_segment(base: &str, segment: &str) -> String {
    if base.ends_with(SEPARATOR) {
        format!("{}{}", base, segment)
    } else {
        format!("{}{}{}", base, SEPARATOR, segment)
    }
}
