//! Kestrel Finality Gadget
//!
//! Weighted two-stage voting over the block tree. Each round collects prevotes and precommits
//! from the voter set active at its base block:
//!
//! ```text
//! Round N:
//!
//! 1. Voters prevote for the head of their best chain
//! 2. prevote ghost = deepest block with 2/3+1 prevote weight (votes count for ancestors)
//! 3. Voters precommit for the prevote ghost
//! 4. The deepest ancestor of the ghost with 2/3+1 precommit weight is FINAL
//! 5. Once the estimate can no longer move the round is completable and round N+1 starts
//!    from that estimate
//! ```
//!
//! A voter signing two different blocks in one stage is an equivocator. Its weight is
//! dropped from that stage and the proof is handed to the [`Environment`].
//!
//! All state is owned by a single [`FinalityService`] task; callers talk to it through a
//! [`FinalityHandle`].

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod chain;
mod config;
mod environment;
mod error;
mod round;
mod service;
mod vote;
mod voter_set;
pub mod weighting;

pub use chain::RoundChain;
pub use config::{
    FinalityConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_ROUNDS_TO_KEEP, DEFAULT_ROUND_TIMEOUT,
};
pub use environment::{
    ChannelEnvironment, Environment, EnvironmentReceivers, FinalityNotification, OutboundMessage,
    RecordingEnvironment,
};
pub use error::{FinalityError, VotingRoundError};
pub use round::{RoundState, VoteImport, VotingRound};
pub use service::{
    spawn_finality_service, BlockImport, FinalityCommand, FinalityHandle, FinalityService,
    FinalitySnapshot,
};
pub use vote::{Equivocation, Justification, Vote, VoteKind};
pub use voter_set::VoterSet;

/// Round number. Round zero is the settled genesis round.
pub type RoundNumber = u64;
