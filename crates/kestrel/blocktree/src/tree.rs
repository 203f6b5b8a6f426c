//! Public block tree contract: import, lookup, chain traversal and pruning.

use crate::{
    cached::CachedTree, meta::TreeMeta, node::TreeNode, BlockHash, BlockInfo, BlockNumber,
    BlockTreeError, EpochDigest, EpochNumber, NodeId,
};
use alloy_primitives::{
    map::{B256HashMap, B256HashSet},
    Bytes,
};
use tracing::{debug, info};

/// Signal returned by a chain visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    /// Keep walking down the chain
    Continue,
    /// Stop after the current node
    Exit,
}

/// Outcome of moving the root forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedBlocks {
    /// The new root
    pub new_root: BlockInfo,
    /// Every block discarded by the move
    pub pruned: Vec<BlockInfo>,
}

/// Tree of imported blocks rooted at the last finalized block.
#[derive(Debug)]
pub struct BlockTree {
    tree: CachedTree,
}

impl BlockTree {
    /// Create a tree containing only the finalized `root`.
    pub fn new(
        root: BlockInfo,
        epoch_number: EpochNumber,
        epoch_digest: EpochDigest,
        next_epoch_digest: Option<EpochDigest>,
        justification: Option<Bytes>,
    ) -> Self {
        let node = TreeNode::root(root, epoch_number, epoch_digest, next_epoch_digest);
        Self { tree: CachedTree::new(node, justification) }
    }

    /// Import a block under an existing parent.
    pub fn insert(
        &mut self,
        parent_hash: BlockHash,
        hash: BlockHash,
        number: BlockNumber,
        epoch_number: EpochNumber,
        next_epoch_digest: Option<EpochDigest>,
    ) -> Result<NodeId, BlockTreeError> {
        if self.tree.find(&hash).is_some() {
            return Err(BlockTreeError::BlockAlreadyExists(hash));
        }
        let parent_id =
            self.tree.find(&parent_hash).ok_or(BlockTreeError::UnknownParent { parent_hash })?;
        let parent = self
            .tree
            .node(parent_id)
            .ok_or(BlockTreeError::UnknownParent { parent_hash })?;

        if parent.number.checked_add(1) != Some(number) {
            return Err(BlockTreeError::InvalidBlockNumber {
                number,
                parent_number: parent.number,
            });
        }
        let same_epoch = epoch_number == parent.epoch_number;
        if !same_epoch && parent.epoch_number.checked_add(1) != Some(epoch_number) {
            return Err(BlockTreeError::InvalidEpochNumber {
                epoch_number,
                parent_epoch: parent.epoch_number,
            });
        }

        let node = TreeNode::child_of(
            parent_id,
            parent,
            BlockInfo::new(hash, number),
            epoch_number,
            next_epoch_digest,
        );
        let id = self.tree.attach(parent_id, node);

        debug!(
            target: "kestrel::blocktree",
            %hash,
            number,
            parent = %parent_hash,
            epoch = epoch_number,
            "Imported block"
        );
        Ok(id)
    }

    /// Locate a block by breadth-first search from the root.
    pub fn find(&self, hash: &BlockHash) -> Option<NodeId> {
        self.tree.find(hash)
    }

    /// Look up a block by hash
    pub fn get(&self, hash: &BlockHash) -> Option<&TreeNode> {
        self.find(hash).and_then(|id| self.tree.node(id))
    }

    /// Resolve a handle. Stale handles resolve to `None`.
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.tree.node(id)
    }

    /// Whether the block is in the tree
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.find(hash).is_some()
    }

    /// The root (last finalized) node
    pub fn root(&self) -> &TreeNode {
        self.tree.root_node()
    }

    /// Handle of the root node
    pub const fn root_id(&self) -> NodeId {
        self.tree.root_id()
    }

    /// Hash and number of the root
    pub fn root_info(&self) -> BlockInfo {
        self.root().info()
    }

    /// Cached summary of the tree
    pub const fn meta(&self) -> &TreeMeta {
        self.tree.meta()
    }

    /// Hashes of all childless blocks
    pub const fn leaves(&self) -> &B256HashSet {
        self.tree.meta().leaves()
    }

    /// The leaf with the highest number
    pub fn deepest_leaf(&self) -> BlockInfo {
        self.tree
            .node(self.meta().deepest_leaf())
            .map_or_else(|| self.root_info(), TreeNode::info)
    }

    /// The last finalized block
    pub fn last_finalized(&self) -> BlockInfo {
        self.tree
            .node(self.meta().last_finalized())
            .map_or_else(|| self.root_info(), TreeNode::info)
    }

    /// Number of blocks in the tree, root included
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the tree holds only its root
    pub const fn is_empty(&self) -> bool {
        self.tree.len() <= 1
    }

    /// Visit every node on the path from `from` to `to`, both inclusive, in increasing
    /// number order. The visitor may stop the walk early.
    ///
    /// Parent links only point upward, so the walk first climbs from `to` and records the
    /// child index taken at every fork, then descends from `from` following those choices.
    pub fn apply_to_chain<F>(
        &self,
        from: &BlockInfo,
        to: &BlockInfo,
        mut visit: F,
    ) -> Result<(), BlockTreeError>
    where
        F: FnMut(&TreeNode) -> VisitControl,
    {
        let no_chain = || BlockTreeError::NoChainBetweenBlocks { from: *from, to: *to };

        let from_id = self.find(&from.hash).ok_or_else(no_chain)?;
        let to_id = self.find(&to.hash).ok_or_else(no_chain)?;
        let from_node = self.tree.node(from_id).ok_or_else(no_chain)?;
        let to_node = self.tree.node(to_id).ok_or_else(no_chain)?;
        if from_node.number != from.number || to_node.number != to.number {
            return Err(no_chain());
        }

        let mut fork_choice: B256HashMap<usize> = B256HashMap::default();
        let mut current_id = to_id;
        let mut current = to_node;
        while current.number > from_node.number {
            let parent_id = current.parent.ok_or_else(no_chain)?;
            let parent = self.tree.node(parent_id).ok_or_else(no_chain)?;
            if parent.children.len() > 1 {
                let index = parent
                    .children
                    .iter()
                    .position(|child| *child == current_id)
                    .ok_or_else(no_chain)?;
                fork_choice.insert(parent.hash, index);
            }
            current_id = parent_id;
            current = parent;
        }
        if current_id != from_id {
            return Err(no_chain());
        }

        let mut current = from_node;
        loop {
            if visit(current) == VisitControl::Exit || current.number >= to.number {
                return Ok(());
            }
            let next = match current.children.as_slice() {
                [] => return Ok(()),
                [only] => *only,
                children => {
                    let index = fork_choice.get(&current.hash).copied().ok_or_else(no_chain)?;
                    children[index]
                }
            };
            current = self.tree.node(next).ok_or_else(no_chain)?;
        }
    }

    /// Whether `descendant` is `ancestor` or one of its descendants.
    pub fn is_ancestor_or_self(&self, ancestor: &BlockInfo, descendant: &BlockInfo) -> bool {
        if ancestor.number > descendant.number {
            return false;
        }
        let Some(mut id) = self.find(&descendant.hash) else { return false };
        if self.tree.node(id).is_none_or(|node| node.number != descendant.number) {
            return false;
        }
        loop {
            let Some(node) = self.tree.node(id) else { return false };
            if node.number <= ancestor.number {
                return node.number == ancestor.number && node.hash == ancestor.hash;
            }
            match node.parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Deepest leaf descending from `hash` (or `hash` itself when it is a leaf).
    pub fn best_chain_containing(&self, hash: &BlockHash) -> Option<BlockInfo> {
        let start = self.find(hash)?;
        let mut best = self.tree.node(start)?.info();

        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.tree.node(id) else { continue };
            if node.children.is_empty() {
                if node.number > best.number {
                    best = node.info();
                }
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        Some(best)
    }

    /// Move the root to `hash` and discard every branch not descending from it.
    ///
    /// Finalizing the current root again is a no-op. An unknown hash is rejected without
    /// touching the tree.
    pub fn finalize(
        &mut self,
        hash: &BlockHash,
        justification: Option<Bytes>,
    ) -> Result<FinalizedBlocks, BlockTreeError> {
        let new_root = self.find(hash).ok_or(BlockTreeError::UnknownBlock(*hash))?;
        if new_root == self.tree.root_id() {
            return Ok(FinalizedBlocks { new_root: self.root_info(), pruned: Vec::new() });
        }

        let pruned = self.tree.update_tree_root(new_root, justification);
        let new_root = self.root_info();
        info!(
            target: "kestrel::blocktree",
            root = %new_root,
            pruned = pruned.len(),
            leaves = self.leaves().len(),
            "Finalized block"
        );
        Ok(FinalizedBlocks { new_root, pruned })
    }

    /// Remove a block (typically an invalid one) together with its descendants.
    pub fn remove_leaf_or_subtree(
        &mut self,
        hash: &BlockHash,
    ) -> Result<Vec<BlockInfo>, BlockTreeError> {
        let id = self.find(hash).ok_or(BlockTreeError::UnknownBlock(*hash))?;
        if id == self.tree.root_id() {
            return Err(BlockTreeError::CannotRemoveRoot(*hash));
        }

        let removed = self.tree.detach(id);
        debug!(target: "kestrel::blocktree", %hash, removed = removed.len(), "Removed subtree");
        Ok(removed)
    }
}
