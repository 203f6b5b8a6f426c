//! Kestrel Block Tree
//!
//! Fork-aware tree of imported blocks, rooted at the last finalized block.
//!
//! ```text
//!            A (root, finalized)
//!          /   \
//!         B     C
//!        /
//!       D          leaves = {C, D}, deepest leaf = D
//! ```
//!
//! Nodes live in a generational arena: children are owned handle lists, parent links and
//! cached references are plain handles that stop resolving once their node is pruned.
//! Finalization moves the root forward and frees every branch that does not lead to it.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cached;
mod error;
mod meta;
mod node;
mod primitives;
mod tree;

pub use cached::CachedTree;
pub use error::BlockTreeError;
pub use meta::TreeMeta;
pub use node::{NodeId, TreeNode};
pub use primitives::{BlockHash, BlockInfo, BlockNumber, EpochDigest, EpochNumber, VoterId};
pub use tree::{BlockTree, FinalizedBlocks, VisitControl};
