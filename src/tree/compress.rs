//! Compact renderings of a built tree.
//!
//! Unbounded compression mirrors the tree with `prefix = name`. Level compression keeps
//! nodes down to depth `L` and folds each depth-`L` node's single-child continuation into
//! one compound prefix (`a/b/c`), so long chains past the horizon are merged rather than
//! cut. A chain stops folding where it branches.

use super::{join_segment, CompressedNode, DepthLimit, TreeNode};

pub fn compress_unbounded(node: &TreeNode) -> CompressedNode {
    CompressedNode {
        prefix: node.name.clone(),
        children: node.children.iter().map(compress_unbounded).collect(),
    }
}

/// `None` when a level is requested that the tree never reaches.
pub fn compress_tree(tree: &TreeNode, depth: DepthLimit) -> Option<CompressedNode> {
    match depth {
        DepthLimit::Unlimited => Some(compress_unbounded(tree)),
        DepthLimit::Levels(level) => {
            if tree.max_depth() < tree.depth + level {
                return None;
            }
            Some(compress_to_level(tree, level))
        }
    }
}

fn compress_to_level(node: &TreeNode, remaining: usize) -> CompressedNode {
    if remaining == 0 {
        return CompressedNode::leaf(chain_prefix(node));
    }
    CompressedNode {
        prefix: node.name.clone(),
        children: node.children.iter().map(|c| compress_to_level(c, remaining - 1)).collect(),
    }
}

fn chain_prefix(node: &TreeNode) -> String {
    let mut prefix = node.name.clone();
    let mut cur = node;
    while let [only] = cur.children.as_slice() {
        prefix = join_segment(&prefix, &only.name);
        cur = only;
    }
    prefix
}
