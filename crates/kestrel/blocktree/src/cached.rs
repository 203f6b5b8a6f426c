//! Node storage plus meta bookkeeping. Every structural mutation goes through here.

use crate::{
    meta::TreeMeta,
    node::{NodeArena, TreeNode},
    BlockHash, BlockInfo, NodeId,
};
use alloy_primitives::Bytes;
use std::collections::VecDeque;
use tracing::debug;

/// Arena of nodes rooted at the last finalized block, with its cached [`TreeMeta`].
#[derive(Debug)]
pub struct CachedTree {
    arena: NodeArena,
    root: NodeId,
    meta: TreeMeta,
}

impl CachedTree {
    pub(crate) fn new(root: TreeNode, justification: Option<Bytes>) -> Self {
        let mut arena = NodeArena::default();
        let root = arena.insert(root);
        let meta = TreeMeta::from_subtree(&arena, root, justification);
        Self { arena, root, meta }
    }

    pub(crate) const fn root_id(&self) -> NodeId {
        self.root
    }

    pub(crate) fn root_node(&self) -> &TreeNode {
        self.arena.get(self.root).expect("tree root is never removed from the arena")
    }

    pub(crate) const fn meta(&self) -> &TreeMeta {
        &self.meta
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id)
    }

    pub(crate) const fn len(&self) -> usize {
        self.arena.len()
    }

    /// Breadth-first search from the root.
    pub(crate) fn find(&self, hash: &BlockHash) -> Option<NodeId> {
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.arena.get(id) else { continue };
            if node.hash == *hash {
                return Some(id);
            }
            queue.extend(node.children.iter());
        }
        None
    }

    /// Link a freshly built node under `parent` and update leaves and deepest leaf.
    pub(crate) fn attach(&mut self, parent: NodeId, node: TreeNode) -> NodeId {
        let hash = node.hash;
        let number = node.number;
        let id = self.arena.insert(node);

        if let Some(parent) = self.arena.get_mut(parent) {
            parent.children.push(id);
            self.meta.leaves.remove(&parent.hash);
        }
        self.meta.leaves.insert(hash);

        match self.arena.get(self.meta.deepest_leaf).map(|deepest| deepest.number) {
            Some(deepest) if number <= deepest => {}
            Some(_) => self.meta.deepest_leaf = id,
            None => self.rescan_deepest_leaf(id),
        }
        id
    }

    /// Unlink `id` from its parent and free its subtree. Returns the removed blocks.
    pub(crate) fn detach(&mut self, id: NodeId) -> Vec<BlockInfo> {
        let Some(parent_id) = self.arena.get(id).and_then(|node| node.parent) else {
            return Vec::new();
        };

        if let Some(parent) = self.arena.get_mut(parent_id) {
            parent.children.retain(|child| *child != id);
            if parent.children.is_empty() {
                self.meta.leaves.insert(parent.hash);
            }
        }

        let mut removed = Vec::new();
        self.teardown(id, &mut removed);

        if self.arena.get(self.meta.deepest_leaf).is_none() {
            self.rescan_deepest_leaf(parent_id);
        }
        removed
    }

    /// Make `new_root` the root, freeing every branch that does not lead to it.
    ///
    /// Returns the discarded blocks: sibling branches and the old root→new root ancestors.
    pub(crate) fn update_tree_root(
        &mut self,
        new_root: NodeId,
        justification: Option<Bytes>,
    ) -> Vec<BlockInfo> {
        let mut pruned = Vec::new();
        let mut keep = new_root;
        let mut cursor = self.arena.get(new_root).and_then(|node| node.parent);

        while let Some(ancestor_id) = cursor {
            let Some(ancestor) = self.arena.remove(ancestor_id) else { break };
            for &child in &ancestor.children {
                if child != keep {
                    self.teardown(child, &mut pruned);
                }
            }
            self.meta.leaves.remove(&ancestor.hash);
            pruned.push(ancestor.info());

            keep = ancestor_id;
            cursor = ancestor.parent;
        }

        if let Some(root) = self.arena.get_mut(new_root) {
            root.parent = None;
            root.finalized = true;
        }
        self.root = new_root;
        self.meta = TreeMeta::from_subtree(&self.arena, new_root, justification);
        pruned
    }

    /// Free a branch with an explicit work list. Children are detached before their
    /// parent is dropped, so teardown depth never depends on chain length.
    fn teardown(&mut self, branch: NodeId, removed: &mut Vec<BlockInfo>) {
        let mut stack = vec![branch];
        while let Some(id) = stack.pop() {
            let Some(mut node) = self.arena.remove(id) else { continue };
            stack.append(&mut node.children);
            self.meta.leaves.remove(&node.hash);
            removed.push(node.info());
        }
    }

    /// Pick the deepest surviving leaf, starting from `from`, and drop leaf entries
    /// that no longer resolve.
    fn rescan_deepest_leaf(&mut self, from: NodeId) {
        let mut deepest = from;
        let mut deepest_number = self.arena.get(from).map_or(0, |node| node.number);

        let hashes: Vec<BlockHash> = self.meta.leaves.iter().copied().collect();
        for hash in hashes {
            match self.find(&hash) {
                None => {
                    debug!(target: "kestrel::blocktree", %hash, "Dropping stale leaf");
                    self.meta.leaves.remove(&hash);
                }
                Some(leaf) => {
                    let number = self.arena.get(leaf).map_or(0, |node| node.number);
                    if number > deepest_number {
                        deepest = leaf;
                        deepest_number = number;
                    }
                }
            }
        }
        self.meta.deepest_leaf = deepest;
    }
}
