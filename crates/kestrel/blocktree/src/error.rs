//! Block tree error types

use crate::{BlockHash, BlockInfo, BlockNumber, EpochNumber};
use thiserror::Error;

/// Errors returned by [`BlockTree`](crate::BlockTree) operations.
///
/// None of these leave the tree partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockTreeError {
    /// Parent of an imported block is not in the tree
    #[error("Parent block not found: {parent_hash}")]
    UnknownParent {
        /// Hash of the missing parent
        parent_hash: BlockHash,
    },

    /// The second block does not descend from the first one
    #[error("No chain exists between blocks {from} and {to}")]
    NoChainBetweenBlocks {
        /// Start of the requested chain
        from: BlockInfo,
        /// End of the requested chain
        to: BlockInfo,
    },

    /// Block is not in the tree
    #[error("Block not found: {0}")]
    UnknownBlock(BlockHash),

    /// Block is already in the tree
    #[error("Block already known: {0}")]
    BlockAlreadyExists(BlockHash),

    /// Block number does not extend the parent by one
    #[error("Block number {number} does not follow parent number {parent_number}")]
    InvalidBlockNumber {
        /// Number of the imported block
        number: BlockNumber,
        /// Number of its parent
        parent_number: BlockNumber,
    },

    /// Epoch number decreases or skips an epoch
    #[error("Epoch {epoch_number} cannot follow parent epoch {parent_epoch}")]
    InvalidEpochNumber {
        /// Epoch of the imported block
        epoch_number: EpochNumber,
        /// Epoch of its parent
        parent_epoch: EpochNumber,
    },

    /// The root of the tree can only move through finalization
    #[error("Cannot remove the tree root {0}")]
    CannotRemoveRoot(BlockHash),
}
