//! Weighted voter set of one round.

use alloy_primitives::map::AddressHashMap;
use kestrel_blocktree::{EpochDigest, VoterId};

/// Voters with their weights, in the order their authority list declares them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterSet {
    /// Weight per voter
    weights: AddressHashMap<u64>,
    /// Declaration order
    ordered: Vec<VoterId>,
    /// Sum of all weights
    total_weight: u64,
}

impl VoterSet {
    /// Build a set from `(voter, weight)` pairs. A repeated voter keeps its first weight.
    pub fn new(voters: impl IntoIterator<Item = (VoterId, u64)>) -> Self {
        let mut set = Self::default();
        for (voter, weight) in voters {
            if set.weights.contains_key(&voter) {
                continue;
            }
            set.weights.insert(voter, weight);
            set.ordered.push(voter);
            set.total_weight = set.total_weight.saturating_add(weight);
        }
        set
    }

    /// Authority set announced by an epoch digest
    pub fn from_digest(digest: &EpochDigest) -> Self {
        Self::new(digest.authorities.iter().copied())
    }

    /// Weight of a voter, `None` when it is not part of the set
    pub fn weight(&self, voter: &VoterId) -> Option<u64> {
        self.weights.get(voter).copied()
    }

    /// Whether the voter belongs to the set
    pub fn contains(&self, voter: &VoterId) -> bool {
        self.weights.contains_key(voter)
    }

    /// Sum of all voter weights
    pub const fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Supermajority threshold (2/3 + 1 of the total weight)
    pub fn threshold(&self) -> u64 {
        ((u128::from(self.total_weight) * 2 / 3) + 1) as u64
    }

    /// Voters in declaration order
    pub fn voters(&self) -> impl Iterator<Item = (&VoterId, u64)> + '_ {
        self.ordered.iter().map(|voter| (voter, self.weights.get(voter).copied().unwrap_or(0)))
    }

    /// Number of voters
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
