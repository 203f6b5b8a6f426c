//! Tree nodes and the generational arena that owns them.
//!
//! Parent links and cached references are plain [`NodeId`]s. A handle whose slot has been
//! freed (or reused) no longer resolves, which is how pruned referents show up as stale.

use crate::{BlockHash, BlockInfo, BlockNumber, EpochDigest, EpochNumber};
use std::sync::Arc;

/// Stable handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// One block in the fork tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub(crate) hash: BlockHash,
    pub(crate) number: BlockNumber,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) epoch_number: EpochNumber,
    pub(crate) epoch_digest: Arc<EpochDigest>,
    pub(crate) next_epoch_digest: Arc<EpochDigest>,
    pub(crate) finalized: bool,
}

impl TreeNode {
    /// Root node owning its digests directly.
    pub(crate) fn root(
        block: BlockInfo,
        epoch_number: EpochNumber,
        epoch_digest: EpochDigest,
        next_epoch_digest: Option<EpochDigest>,
    ) -> Self {
        let epoch_digest = Arc::new(epoch_digest);
        let next_epoch_digest = match next_epoch_digest {
            Some(next) if next != *epoch_digest => Arc::new(next),
            _ => Arc::clone(&epoch_digest),
        };

        Self {
            hash: block.hash,
            number: block.number,
            parent: None,
            children: Vec::new(),
            epoch_number,
            epoch_digest,
            next_epoch_digest,
            finalized: true,
        }
    }

    /// Child node inheriting digests from `parent`.
    ///
    /// The child adopts the parent's pending digest when it opens a new epoch. A supplied
    /// `next_epoch_digest` that differs from the inherited one schedules a new change.
    pub(crate) fn child_of(
        parent_id: NodeId,
        parent: &Self,
        block: BlockInfo,
        epoch_number: EpochNumber,
        next_epoch_digest: Option<EpochDigest>,
    ) -> Self {
        let epoch_digest = if epoch_number != parent.epoch_number {
            Arc::clone(&parent.next_epoch_digest)
        } else {
            Arc::clone(&parent.epoch_digest)
        };
        let mut next = Arc::clone(&parent.next_epoch_digest);

        if let Some(scheduled) = next_epoch_digest {
            if scheduled != *next {
                next = if scheduled == *epoch_digest {
                    Arc::clone(&epoch_digest)
                } else {
                    Arc::new(scheduled)
                };
            }
        }

        Self {
            hash: block.hash,
            number: block.number,
            parent: Some(parent_id),
            children: Vec::new(),
            epoch_number,
            epoch_digest,
            next_epoch_digest: next,
            finalized: false,
        }
    }

    /// Block hash
    pub const fn hash(&self) -> BlockHash {
        self.hash
    }

    /// Block number (depth)
    pub const fn number(&self) -> BlockNumber {
        self.number
    }

    /// Hash and number of this node
    pub const fn info(&self) -> BlockInfo {
        BlockInfo::new(self.hash, self.number)
    }

    /// Parent handle, `None` for the root
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child handles, in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Epoch the block belongs to
    pub const fn epoch_number(&self) -> EpochNumber {
        self.epoch_number
    }

    /// Digest of the epoch the block belongs to
    pub fn epoch_digest(&self) -> &Arc<EpochDigest> {
        &self.epoch_digest
    }

    /// Digest the next epoch will use
    pub fn next_epoch_digest(&self) -> &Arc<EpochDigest> {
        &self.next_epoch_digest
    }

    /// Whether an epoch change is pending below this block
    pub fn has_pending_epoch_change(&self) -> bool {
        !Arc::ptr_eq(&self.epoch_digest, &self.next_epoch_digest)
    }

    /// Whether the block is finalized
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<TreeNode>,
}

/// Slot storage for tree nodes with free-list reuse.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    len: usize,
}

impl NodeArena {
    pub(crate) fn insert(&mut self, node: TreeNode) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId { index, generation: slot.generation };
        }

        let index = self.slots.len();
        self.slots.push(Slot { generation: 0, node: Some(node) });
        NodeId { index, generation: 0 }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Take a node out, invalidating every outstanding handle to it.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<TreeNode> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    fn digest(byte: u8) -> EpochDigest {
        EpochDigest::new(vec![(Address::repeat_byte(byte), 1)])
    }

    fn block(byte: u8, number: u64) -> BlockInfo {
        BlockInfo::new(B256::repeat_byte(byte), number)
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut arena = NodeArena::default();
        let id = arena.insert(TreeNode::root(block(1, 0), 0, digest(1), None));
        assert!(arena.get(id).is_some());

        arena.remove(id);
        assert!(arena.get(id).is_none());

        // Slot reuse must not revive the old handle
        let reused = arena.insert(TreeNode::root(block(2, 0), 0, digest(1), None));
        assert!(arena.get(id).is_none());
        assert_eq!(arena.get(reused).map(TreeNode::hash), Some(B256::repeat_byte(2)));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_digest_inheritance() {
        let mut arena = NodeArena::default();
        let root = TreeNode::root(block(1, 0), 0, digest(1), Some(digest(2)));
        assert!(root.has_pending_epoch_change());
        let root_id = arena.insert(root);
        let root = arena.get(root_id).unwrap().clone();

        // Same epoch keeps the current digest
        let same = TreeNode::child_of(root_id, &root, block(2, 1), 0, None);
        assert!(Arc::ptr_eq(same.epoch_digest(), root.epoch_digest()));
        assert!(Arc::ptr_eq(same.next_epoch_digest(), root.next_epoch_digest()));

        // Epoch boundary adopts the pending digest
        let boundary = TreeNode::child_of(root_id, &root, block(3, 1), 1, None);
        assert!(Arc::ptr_eq(boundary.epoch_digest(), root.next_epoch_digest()));
        assert_eq!(**boundary.epoch_digest(), digest(2));
        assert!(!boundary.has_pending_epoch_change());
    }

    #[test]
    fn test_scheduled_digest_reuses_current_pointer() {
        let mut arena = NodeArena::default();
        let root_id = arena.insert(TreeNode::root(block(1, 0), 0, digest(1), Some(digest(2))));
        let root = arena.get(root_id).unwrap().clone();

        let child = TreeNode::child_of(root_id, &root, block(2, 1), 0, Some(digest(1)));
        assert!(Arc::ptr_eq(child.next_epoch_digest(), child.epoch_digest()));

        let scheduled = TreeNode::child_of(root_id, &root, block(3, 1), 0, Some(digest(3)));
        assert_eq!(**scheduled.next_epoch_digest(), digest(3));
    }
}
