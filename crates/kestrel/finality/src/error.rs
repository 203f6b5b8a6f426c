//! Finality error types

use crate::RoundNumber;
use kestrel_blocktree::{BlockInfo, BlockTreeError, VoterId};
use thiserror::Error;

/// Errors raised while importing votes into a round or checking justifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VotingRoundError {
    /// The vote signature was not verified upstream
    #[error("Invalid signature on vote from {0}")]
    InvalidSignature(VoterId),

    /// A third distinct vote from a voter that already equivocated
    #[error("Redundant equivocation from {0}")]
    RedundantEquivocation(VoterId),

    /// Justification precommits do not reach the supermajority
    #[error("Not enough weight in justification: {weight} < {threshold}")]
    NotEnoughWeight {
        /// Summed precommit weight
        weight: u64,
        /// Required weight
        threshold: u64,
    },

    /// Justification for a round older than the last finalizing round
    #[error("Justification for round {round} is behind finalized round {last_finalized_round}")]
    JustificationForRoundInPast {
        /// Round of the justification
        round: RoundNumber,
        /// Last round that finalized a block
        last_finalized_round: RoundNumber,
    },

    /// Justification for a block at or below the finalized root
    #[error("Justification for block {block} is not above finalized block {finalized}")]
    JustificationForBlockInPast {
        /// Justified block
        block: BlockInfo,
        /// Current finalized block
        finalized: BlockInfo,
    },

    /// Local precommits contradict the justified block
    #[error("Justified block {justified} is greater than the block actually finalized")]
    JustifiedBlockIsGreaterThanActuallyFinalized {
        /// Justified block
        justified: BlockInfo,
    },

    /// No authority set could be resolved for the block
    #[error("No known authorities for block {0}")]
    NoKnownAuthoritiesForBlock(BlockInfo),

    /// The best chain is behind the previous round estimate
    #[error("Last estimate {estimate} is better than prevote target {prevote}")]
    LastEstimateBetterThanPrevote {
        /// Previous round estimate
        estimate: BlockInfo,
        /// Candidate prevote target
        prevote: BlockInfo,
    },

    /// Voter is not part of the round voter set
    #[error("Unknown voter: {0}")]
    UnknownVoter(VoterId),

    /// Voter carries no weight
    #[error("Voter {0} has zero weight")]
    ZeroWeightVoter(VoterId),

    /// Same vote seen twice
    #[error("Duplicated vote from {0}")]
    DuplicatedVote(VoterId),

    /// Voter signed two different blocks
    #[error("Equivocated vote from {0}")]
    EquivocatedVote(VoterId),

    /// Vote from a voter already known to equivocate in this round
    #[error("Vote of known equivocator {0}")]
    VoteOfKnownEquivocator(VoterId),

    /// No prevote ghost exists yet
    #[error("No prevote candidate")]
    NoPrevoteCandidate,

    /// Precommit weight cannot finalize anything past the finalized block
    #[error("Round is not finalizable")]
    RoundIsNotFinalizable,

    /// Voted block is not on a chain from the round base
    #[error(transparent)]
    Chain(#[from] BlockTreeError),
}

/// Top-level finality errors
#[derive(Debug, Error)]
pub enum FinalityError {
    /// Block tree rejected the operation
    #[error(transparent)]
    Tree(#[from] BlockTreeError),

    /// Round rejected the vote or justification
    #[error(transparent)]
    Round(#[from] VotingRoundError),

    /// Round was not started yet
    #[error("Unknown round: {0}")]
    UnknownRound(RoundNumber),

    /// Round was already discarded
    #[error("Round {round} is in the past, oldest kept round is {oldest}")]
    RoundInPast {
        /// Requested round
        round: RoundNumber,
        /// Oldest round still kept
        oldest: RoundNumber,
    },

    /// Service task is gone
    #[error("Finality service stopped")]
    ServiceStopped,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
