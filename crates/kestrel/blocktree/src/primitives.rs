//! Block and epoch primitives shared by the tree and the finality gadget.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash identifying a block.
pub type BlockHash = B256;

/// Height of a block, counted from genesis.
pub type BlockNumber = u64;

/// Index of a BABE-style epoch.
pub type EpochNumber = u64;

/// Identity of a finality voter (authority).
pub type VoterId = Address;

/// Unambiguous reference to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block hash
    pub hash: BlockHash,
    /// Block number
    pub number: BlockNumber,
}

impl BlockInfo {
    /// Create a new block reference
    pub const fn new(hash: BlockHash, number: BlockNumber) -> Self {
        Self { hash, number }
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.hash)
    }
}

/// Authority set and randomness active for a contiguous range of blocks.
///
/// Installed by an epoch-boundary block and inherited by its descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochDigest {
    /// Authorities with their voting weight
    pub authorities: Vec<(VoterId, u64)>,
    /// Epoch randomness
    #[serde(default)]
    pub randomness: B256,
}

impl EpochDigest {
    /// Create a digest without randomness
    pub fn new(authorities: Vec<(VoterId, u64)>) -> Self {
        Self { authorities, randomness: B256::ZERO }
    }

    /// Set the epoch randomness
    pub fn with_randomness(mut self, randomness: B256) -> Self {
        self.randomness = randomness;
        self
    }
}
