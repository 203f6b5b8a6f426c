//! Votes, equivocation proofs, justifications and the per-stage vote tracker.

use crate::{FinalityError, RoundNumber, VoterSet};
use alloy_primitives::{map::AddressHashMap, Bytes};
use kestrel_blocktree::{BlockInfo, VoterId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Voting stage of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    /// First stage
    Prevote,
    /// Second stage
    Precommit,
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prevote => f.write_str("prevote"),
            Self::Precommit => f.write_str("precommit"),
        }
    }
}

/// A signed vote for a block.
///
/// Signatures are checked by the transport before a vote reaches the gadget, which only
/// looks at `signature_verified`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vote {
    /// The block being voted on
    pub block: BlockInfo,
    /// Voter who cast the vote
    pub voter: VoterId,
    /// Opaque signature bytes
    #[serde(default)]
    pub signature: Bytes,
    /// Whether the transport verified the signature
    #[serde(default)]
    pub signature_verified: bool,
}

impl Vote {
    /// Create a vote received from the network
    pub fn new(
        block: BlockInfo,
        voter: VoterId,
        signature: Bytes,
        signature_verified: bool,
    ) -> Self {
        Self { block, voter, signature, signature_verified }
    }

    /// Vote cast by the local voter
    pub fn local(block: BlockInfo, voter: VoterId) -> Self {
        Self::new(block, voter, Bytes::new(), true)
    }
}

/// Proof that a voter signed two different blocks in the same stage of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivocation {
    /// Round the votes were cast in
    pub round: RoundNumber,
    /// Stage the votes were cast in
    pub kind: VoteKind,
    /// The equivocating voter
    pub voter: VoterId,
    /// First vote seen
    pub first: Vote,
    /// Conflicting vote
    pub second: Vote,
}

/// Precommits proving that `target` was finalized in `round`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    /// Round that finalized the target
    pub round: RoundNumber,
    /// Finalized block
    pub target: BlockInfo,
    /// Precommits for the target or its descendants
    pub precommits: Vec<Vote>,
}

impl Justification {
    /// Encode into the blob stored alongside the finalized root
    pub fn encode(&self) -> Result<Bytes, FinalityError> {
        Ok(serde_json::to_vec(self)?.into())
    }

    /// Decode a blob produced by [`Justification::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self, FinalityError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Votes of one voter in one stage
#[derive(Debug, Clone)]
enum VoteMultiplicity {
    Single(Vote),
    Equivocated(Vote, Vote),
}

#[derive(Debug, Clone)]
struct TrackedVoter {
    weight: u64,
    votes: VoteMultiplicity,
}

/// Result of adding a vote to a [`VoteTracker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AddVote {
    /// First vote of the voter
    Fresh,
    /// Already seen
    Duplicated,
    /// Second distinct vote, carrying the first one
    Equivocated(Vote),
    /// Third distinct vote, dropped
    Redundant,
}

/// Votes of one stage, at most two per voter.
#[derive(Debug, Clone, Default)]
pub(crate) struct VoteTracker {
    voters: AddressHashMap<TrackedVoter>,
    /// Weight of every voter seen, equivocators included
    cast_weight: u64,
}

impl VoteTracker {
    pub(crate) fn add(&mut self, vote: Vote, weight: u64) -> AddVote {
        let Some(tracked) = self.voters.get_mut(&vote.voter) else {
            self.cast_weight = self.cast_weight.saturating_add(weight);
            self.voters
                .insert(vote.voter, TrackedVoter { weight, votes: VoteMultiplicity::Single(vote) });
            return AddVote::Fresh;
        };

        match &tracked.votes {
            VoteMultiplicity::Single(first) if first.block == vote.block => AddVote::Duplicated,
            VoteMultiplicity::Single(first) => {
                let first = first.clone();
                tracked.votes = VoteMultiplicity::Equivocated(first.clone(), vote);
                AddVote::Equivocated(first)
            }
            VoteMultiplicity::Equivocated(first, second)
                if first.block == vote.block || second.block == vote.block =>
            {
                AddVote::Duplicated
            }
            VoteMultiplicity::Equivocated(..) => AddVote::Redundant,
        }
    }

    /// Single votes with their weight; equivocators contribute nothing.
    pub(crate) fn contributions(&self) -> impl Iterator<Item = (BlockInfo, u64)> + '_ {
        self.single_votes().map(|(vote, weight)| (vote.block, weight))
    }

    pub(crate) fn single_votes(&self) -> impl Iterator<Item = (&Vote, u64)> + '_ {
        self.voters.values().filter_map(|tracked| match &tracked.votes {
            VoteMultiplicity::Single(vote) => Some((vote, tracked.weight)),
            VoteMultiplicity::Equivocated(..) => None,
        })
    }

    pub(crate) fn is_equivocator(&self, voter: &VoterId) -> bool {
        self.voters
            .get(voter)
            .is_some_and(|tracked| matches!(tracked.votes, VoteMultiplicity::Equivocated(..)))
    }

    pub(crate) fn contains(&self, voter: &VoterId) -> bool {
        self.voters.contains_key(voter)
    }

    pub(crate) const fn cast_weight(&self) -> u64 {
        self.cast_weight
    }

    pub(crate) fn len(&self) -> usize {
        self.voters.len()
    }

    /// Re-weight tracked votes for `voters`, dropping voters it no longer weighs.
    pub(crate) fn reweigh(&mut self, voters: &VoterSet) {
        self.voters.retain(|voter, tracked| match voters.weight(voter) {
            Some(weight) if weight > 0 => {
                tracked.weight = weight;
                true
            }
            _ => false,
        });
        self.cast_weight =
            self.voters.values().fold(0u64, |total, tracked| total.saturating_add(tracked.weight));
    }
}
