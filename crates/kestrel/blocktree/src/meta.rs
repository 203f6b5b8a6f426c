//! Cached summary of the tree shape.

use crate::{node::NodeArena, NodeId};
use alloy_primitives::{map::B256HashSet, Bytes};

/// Leaves, deepest leaf and last finalized block of the tree.
///
/// `deepest_leaf` and `last_finalized` are non-owning handles into the arena.
#[derive(Debug, Clone)]
pub struct TreeMeta {
    pub(crate) leaves: B256HashSet,
    pub(crate) deepest_leaf: NodeId,
    pub(crate) last_finalized: NodeId,
    pub(crate) last_finalized_justification: Option<Bytes>,
}

impl TreeMeta {
    /// Rebuild the summary by walking the subtree under `root`.
    pub(crate) fn from_subtree(
        arena: &NodeArena,
        root: NodeId,
        last_finalized_justification: Option<Bytes>,
    ) -> Self {
        let mut leaves = B256HashSet::default();
        let mut deepest_leaf = root;
        let mut deepest_number = arena.get(root).map_or(0, |node| node.number);

        // explicit stack, children pushed in reverse so the walk keeps insertion order
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = arena.get(id) else { continue };
            if node.children.is_empty() {
                leaves.insert(node.hash);
                if node.number > deepest_number {
                    deepest_leaf = id;
                    deepest_number = node.number;
                }
            } else {
                stack.extend(node.children.iter().rev());
            }
        }

        Self { leaves, deepest_leaf, last_finalized: root, last_finalized_justification }
    }

    /// Hashes of all blocks without children
    pub const fn leaves(&self) -> &B256HashSet {
        &self.leaves
    }

    /// Handle to the leaf with the highest number
    pub const fn deepest_leaf(&self) -> NodeId {
        self.deepest_leaf
    }

    /// Handle to the current root
    pub const fn last_finalized(&self) -> NodeId {
        self.last_finalized
    }

    /// Proof of the last finalization, if one was supplied
    pub const fn last_finalized_justification(&self) -> Option<&Bytes> {
        self.last_finalized_justification.as_ref()
    }
}
