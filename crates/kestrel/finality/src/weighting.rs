//! Weighted ancestry queries over the block tree.
//!
//! A vote for a block also counts for every ancestor of that block, so the weight of a node
//! is the sum of votes cast for it or any of its descendants. Weight never decreases on the
//! way up to the base, and the blocks meeting a supermajority form a single path from the
//! base. The "ghost" is the deepest block on that path.

use kestrel_blocktree::{BlockInfo, BlockTree, NodeId};
use std::collections::HashMap;

/// Cumulative vote weight (own plus descendants) per node below a base block.
#[derive(Debug, Clone, Default)]
pub struct VoteWeights {
    weights: HashMap<NodeId, u64>,
}

impl VoteWeights {
    /// Accumulate `contributions` over the subtree rooted at `base`.
    ///
    /// Votes for blocks that are unknown or do not descend from `base` are ignored.
    pub fn accumulate(
        tree: &BlockTree,
        base: &BlockInfo,
        contributions: impl IntoIterator<Item = (BlockInfo, u64)>,
    ) -> Self {
        let mut weights: HashMap<NodeId, u64> = HashMap::new();
        let Some(base_id) = tree.find(&base.hash) else { return Self { weights } };

        let mut path = Vec::new();
        for (block, weight) in contributions {
            if block.number < base.number {
                continue;
            }
            let Some(mut id) = tree.find(&block.hash) else { continue };
            if tree.node(id).is_none_or(|node| node.number() != block.number) {
                continue;
            }

            path.clear();
            let reached_base = loop {
                path.push(id);
                if id == base_id {
                    break true;
                }
                match tree.node(id) {
                    Some(node) if node.number() > base.number => match node.parent() {
                        Some(parent) => id = parent,
                        None => break false,
                    },
                    _ => break false,
                }
            };

            if reached_base {
                for id in &path {
                    let entry = weights.entry(*id).or_default();
                    *entry = entry.saturating_add(weight);
                }
            }
        }

        Self { weights }
    }

    /// Weight accumulated at a node
    pub fn weight(&self, id: NodeId) -> u64 {
        self.weights.get(&id).copied().unwrap_or(0)
    }

    /// Weight accumulated at a block, zero when unknown
    pub fn weight_of(&self, tree: &BlockTree, block: &BlockInfo) -> u64 {
        tree.find(&block.hash).map_or(0, |id| self.weight(id))
    }
}

/// Deepest block with at least `threshold` weight descending from `base`.
///
/// Returns `None` when even the base misses the threshold, including when there are no
/// votes at all.
pub fn ghost(
    tree: &BlockTree,
    base: &BlockInfo,
    contributions: impl IntoIterator<Item = (BlockInfo, u64)>,
    threshold: u64,
) -> Option<BlockInfo> {
    let weights = VoteWeights::accumulate(tree, base, contributions);
    ghost_by(tree, base, |id| weights.weight(id), |weight| weight >= threshold)
}

/// Descend from `base` while `predicate` holds over the weight of the next block.
///
/// Children are tried in insertion order and the first one satisfying the predicate is
/// followed.
pub fn ghost_by<W, P>(
    tree: &BlockTree,
    base: &BlockInfo,
    weight_of: W,
    predicate: P,
) -> Option<BlockInfo>
where
    W: Fn(NodeId) -> u64,
    P: Fn(u64) -> bool,
{
    let base_id = tree.find(&base.hash)?;
    let mut node = tree.node(base_id)?;
    if node.number() != base.number || !predicate(weight_of(base_id)) {
        return None;
    }

    loop {
        let next = node.children().iter().copied().find(|child| predicate(weight_of(*child)));
        match next.and_then(|id| tree.node(id)) {
            Some(child) => node = child,
            None => return Some(node.info()),
        }
    }
}

/// Deepest ancestor-or-self of `head`, not above `base`, for which `predicate` holds.
pub fn ancestor_meeting<P>(
    tree: &BlockTree,
    head: &BlockInfo,
    base: &BlockInfo,
    predicate: P,
) -> Option<BlockInfo>
where
    P: Fn(NodeId) -> bool,
{
    let mut id = tree.find(&head.hash)?;
    loop {
        let node = tree.node(id)?;
        if node.number() < base.number {
            return None;
        }
        if predicate(id) {
            return Some(node.info());
        }
        if node.hash() == base.hash {
            return None;
        }
        id = node.parent()?;
    }
}
