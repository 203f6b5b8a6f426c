//! A single finality round: prevote and precommit collection plus derived state.

use crate::{
    vote::{AddVote, VoteTracker},
    weighting::{ancestor_meeting, ghost_by, VoteWeights},
    Equivocation, Justification, RoundNumber, Vote, VoteKind, VoterSet, VotingRoundError,
};
use alloy_primitives::map::AddressHashMap;
use kestrel_blocktree::{BlockInfo, BlockTree, BlockTreeError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Derived state of a round. A pure function of the valid votes received so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    /// Round number
    pub round_number: RoundNumber,
    /// Deepest block with supermajority prevote weight
    pub prevote_ghost: Option<BlockInfo>,
    /// Deepest ancestor of the prevote ghost that can still be finalized in this round
    pub estimate: Option<BlockInfo>,
    /// Deepest block with supermajority precommit weight
    pub finalized: Option<BlockInfo>,
    /// Whether the estimate can no longer move
    pub completable: bool,
}

impl RoundState {
    const fn empty(round_number: RoundNumber) -> Self {
        Self {
            round_number,
            prevote_ghost: None,
            estimate: None,
            finalized: None,
            completable: false,
        }
    }
}

/// Outcome of a successful vote import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteImport {
    /// New vote counted
    Imported,
    /// Same vote seen before, nothing changed
    Duplicated,
    /// Second distinct vote of the voter; both are excluded from weighting
    Equivocated(Equivocation),
}

/// Votes and derived state of one round.
#[derive(Debug, Clone)]
pub struct VotingRound {
    number: RoundNumber,
    base: BlockInfo,
    voters: VoterSet,
    prevotes: VoteTracker,
    precommits: VoteTracker,
    state: RoundState,
}

impl VotingRound {
    /// Start collecting votes for blocks descending from `base`.
    pub fn new(number: RoundNumber, base: BlockInfo, voters: VoterSet) -> Self {
        Self {
            number,
            base,
            voters,
            prevotes: VoteTracker::default(),
            precommits: VoteTracker::default(),
            state: RoundState::empty(number),
        }
    }

    /// Round zero, settled on `base` without any votes.
    pub fn genesis(base: BlockInfo, voters: VoterSet) -> Self {
        let mut round = Self::new(0, base, voters);
        round.state = RoundState {
            round_number: 0,
            prevote_ghost: Some(base),
            estimate: Some(base),
            finalized: Some(base),
            completable: true,
        };
        round
    }

    /// Round number
    pub const fn number(&self) -> RoundNumber {
        self.number
    }

    /// Block every vote must descend from
    pub const fn base(&self) -> BlockInfo {
        self.base
    }

    /// Voters of the round
    pub const fn voters(&self) -> &VoterSet {
        &self.voters
    }

    /// Derived round state
    pub const fn state(&self) -> &RoundState {
        &self.state
    }

    /// Current prevote ghost
    pub const fn prevote_ghost(&self) -> Option<BlockInfo> {
        self.state.prevote_ghost
    }

    /// Current estimate
    pub const fn estimate(&self) -> Option<BlockInfo> {
        self.state.estimate
    }

    /// Deepest block finalized by this round
    pub const fn finalized(&self) -> Option<BlockInfo> {
        self.state.finalized
    }

    /// Whether the round is completable
    pub const fn completable(&self) -> bool {
        self.state.completable
    }

    /// Whether the voter has prevoted
    pub fn has_prevoted(&self, voter: &kestrel_blocktree::VoterId) -> bool {
        self.prevotes.contains(voter)
    }

    /// Whether the voter has precommitted
    pub fn has_precommitted(&self, voter: &kestrel_blocktree::VoterId) -> bool {
        self.precommits.contains(voter)
    }

    /// Import a prevote and recompute the derived state.
    pub fn import_prevote(
        &mut self,
        tree: &BlockTree,
        vote: Vote,
    ) -> Result<VoteImport, VotingRoundError> {
        self.import(tree, VoteKind::Prevote, vote)
    }

    /// Import a precommit and recompute the derived state.
    pub fn import_precommit(
        &mut self,
        tree: &BlockTree,
        vote: Vote,
    ) -> Result<VoteImport, VotingRoundError> {
        self.import(tree, VoteKind::Precommit, vote)
    }

    fn import(
        &mut self,
        tree: &BlockTree,
        kind: VoteKind,
        vote: Vote,
    ) -> Result<VoteImport, VotingRoundError> {
        let weight = self.check_voter(&vote)?;
        self.check_descends(tree, &self.base, &vote.block)?;

        let voter = vote.voter;
        let block = vote.block;
        let tracker = match kind {
            VoteKind::Prevote => &mut self.prevotes,
            VoteKind::Precommit => &mut self.precommits,
        };
        let outcome = match tracker.add(vote.clone(), weight) {
            AddVote::Fresh => VoteImport::Imported,
            AddVote::Duplicated => return Ok(VoteImport::Duplicated),
            AddVote::Equivocated(first) => VoteImport::Equivocated(Equivocation {
                round: self.number,
                kind,
                voter,
                first,
                second: vote,
            }),
            AddVote::Redundant => return Err(VotingRoundError::RedundantEquivocation(voter)),
        };

        debug!(
            target: "kestrel::round",
            round = self.number,
            %kind,
            %voter,
            %block,
            equivocated = matches!(outcome, VoteImport::Equivocated(_)),
            "Imported vote"
        );
        self.recompute(tree);
        Ok(outcome)
    }

    /// Membership, weight and signature checks shared by live votes and justifications.
    fn check_voter(&self, vote: &Vote) -> Result<u64, VotingRoundError> {
        let weight =
            self.voters.weight(&vote.voter).ok_or(VotingRoundError::UnknownVoter(vote.voter))?;
        if weight == 0 {
            return Err(VotingRoundError::ZeroWeightVoter(vote.voter));
        }
        if !vote.signature_verified {
            return Err(VotingRoundError::InvalidSignature(vote.voter));
        }
        Ok(weight)
    }

    fn check_descends(
        &self,
        tree: &BlockTree,
        ancestor: &BlockInfo,
        block: &BlockInfo,
    ) -> Result<(), VotingRoundError> {
        if tree.is_ancestor_or_self(ancestor, block) {
            Ok(())
        } else {
            Err(BlockTreeError::NoChainBetweenBlocks { from: *ancestor, to: *block }.into())
        }
    }

    /// Move the round onto `base`, keeping the votes collected so far.
    ///
    /// Votes are re-weighted when `voters` differs. Returns whether the state changed.
    pub fn rebase(&mut self, tree: &BlockTree, base: BlockInfo, voters: VoterSet) -> bool {
        if voters != self.voters {
            self.prevotes.reweigh(&voters);
            self.precommits.reweigh(&voters);
            self.voters = voters;
        }
        if base != self.base {
            debug!(
                target: "kestrel::round",
                round = self.number,
                from = %self.base,
                to = %base,
                "Rebasing round"
            );
            self.base = base;
        }
        self.recompute(tree)
    }

    /// Re-derive the round state from the collected votes. Returns whether it changed.
    ///
    /// The genesis round and rounds whose base was pruned keep their state.
    pub fn recompute(&mut self, tree: &BlockTree) -> bool {
        if self.number == 0 || !tree.contains(&self.base.hash) {
            return false;
        }
        let previous = self.state.clone();
        let threshold = self.voters.threshold();
        let base = self.base;

        let prevote_weights = VoteWeights::accumulate(tree, &base, self.prevotes.contributions());
        let ghost = ghost_by(
            tree,
            &base,
            |id| prevote_weights.weight(id),
            |weight| weight >= threshold,
        );
        self.state.prevote_ghost = ghost;

        let Some(ghost) = ghost else {
            self.state.estimate = None;
            return self.state != previous;
        };

        let precommit_weights =
            VoteWeights::accumulate(tree, &base, self.precommits.contributions());
        let finalized =
            ancestor_meeting(tree, &ghost, &base, |id| precommit_weights.weight(id) >= threshold);
        if let Some(finalized) = finalized {
            if self.state.finalized.is_none_or(|current| current.number < finalized.number) {
                self.state.finalized = Some(finalized);
            }
        }

        let cast = self.precommits.cast_weight();
        if cast < threshold {
            self.state.estimate = Some(ghost);
            return self.state != previous;
        }

        // Voters who already precommitted cannot add weight anywhere else.
        let remaining = self.voters.total_weight().saturating_sub(cast);
        let possible = |weight: u64| weight.saturating_add(remaining) >= threshold;
        let estimate =
            ancestor_meeting(tree, &ghost, &base, |id| possible(precommit_weights.weight(id)));
        self.state.estimate = estimate;

        let completable = self.precommits.len() == self.voters.len() ||
            estimate.is_some_and(|estimate| {
                estimate != ghost ||
                    ghost_by(tree, &ghost, |id| precommit_weights.weight(id), possible) ==
                        Some(ghost)
            });
        self.state.completable |= completable;

        self.state != previous
    }

    /// Block this round finalizes beyond `last_finalized`.
    pub fn finalizable_candidate(
        &self,
        last_finalized: &BlockInfo,
    ) -> Result<BlockInfo, VotingRoundError> {
        if self.state.prevote_ghost.is_none() {
            return Err(VotingRoundError::NoPrevoteCandidate);
        }
        match self.state.finalized {
            Some(finalized) if finalized.number > last_finalized.number => Ok(finalized),
            _ => Err(VotingRoundError::RoundIsNotFinalizable),
        }
    }

    /// Check a justification against this round's voters without importing it.
    ///
    /// Returns the summed weight of the justification precommits.
    pub fn verify_justification(
        &self,
        tree: &BlockTree,
        justification: &Justification,
    ) -> Result<u64, VotingRoundError> {
        let target = justification.target;
        self.check_descends(tree, &self.base, &target)?;

        let mut seen: AddressHashMap<Vec<BlockInfo>> = AddressHashMap::default();
        let mut equivocator = None;
        let mut weight = 0u64;
        for precommit in &justification.precommits {
            let voter_weight = self.check_voter(precommit)?;
            if self.precommits.is_equivocator(&precommit.voter) {
                return Err(VotingRoundError::VoteOfKnownEquivocator(precommit.voter));
            }
            self.check_descends(tree, &target, &precommit.block)?;

            let blocks = seen.entry(precommit.voter).or_default();
            if blocks.contains(&precommit.block) {
                return Err(VotingRoundError::DuplicatedVote(precommit.voter));
            }
            match blocks.len() {
                0 => weight = weight.saturating_add(voter_weight),
                1 => {
                    equivocator.get_or_insert(precommit.voter);
                }
                _ => return Err(VotingRoundError::RedundantEquivocation(precommit.voter)),
            }
            blocks.push(precommit.block);
        }

        if let Some(voter) = equivocator {
            return Err(VotingRoundError::EquivocatedVote(voter));
        }
        let threshold = self.voters.threshold();
        if weight < threshold {
            return Err(VotingRoundError::NotEnoughWeight { weight, threshold });
        }
        Ok(weight)
    }

    /// Verify and import a justification, marking its target finalized.
    ///
    /// Returns the equivocations its precommits expose against locally known ones.
    pub fn apply_justification(
        &mut self,
        tree: &BlockTree,
        justification: &Justification,
    ) -> Result<Vec<Equivocation>, VotingRoundError> {
        self.verify_justification(tree, justification)?;

        let mut trial = self.precommits.clone();
        let mut equivocations = Vec::new();
        for precommit in &justification.precommits {
            let weight = self.voters.weight(&precommit.voter).unwrap_or_default();
            match trial.add(precommit.clone(), weight) {
                AddVote::Fresh | AddVote::Duplicated => {}
                AddVote::Equivocated(first) => equivocations.push(Equivocation {
                    round: self.number,
                    kind: VoteKind::Precommit,
                    voter: precommit.voter,
                    first,
                    second: precommit.clone(),
                }),
                AddVote::Redundant => {
                    return Err(VotingRoundError::RedundantEquivocation(precommit.voter))
                }
            }
        }

        let target = justification.target;
        let weights = VoteWeights::accumulate(tree, &self.base, trial.contributions());
        let threshold = self.voters.threshold();
        let supported =
            ghost_by(tree, &self.base, |id| weights.weight(id), |weight| weight >= threshold);
        if !supported.is_some_and(|head| tree.is_ancestor_or_self(&target, &head)) {
            return Err(VotingRoundError::JustifiedBlockIsGreaterThanActuallyFinalized {
                justified: target,
            });
        }

        self.precommits = trial;
        if self.state.finalized.is_none_or(|current| current.number < target.number) {
            self.state.finalized = Some(target);
        }
        self.recompute(tree);
        Ok(equivocations)
    }

    /// Justification for `block` built from the precommits for it or its descendants.
    pub fn justification_for(&self, tree: &BlockTree, block: &BlockInfo) -> Justification {
        let mut precommits: Vec<Vote> = self
            .precommits
            .single_votes()
            .filter(|(vote, _)| tree.is_ancestor_or_self(block, &vote.block))
            .map(|(vote, _)| vote.clone())
            .collect();
        precommits.sort_by(|a, b| a.voter.cmp(&b.voter));
        Justification { round: self.number, target: *block, precommits }
    }

    /// Block the local voter prevotes for: head of the best chain containing `last_estimate`.
    pub fn prevote_target(
        &self,
        tree: &BlockTree,
        last_estimate: &BlockInfo,
    ) -> Result<BlockInfo, VotingRoundError> {
        let head =
            tree.best_chain_containing(&last_estimate.hash).unwrap_or_else(|| tree.deepest_leaf());
        if head.number < last_estimate.number {
            return Err(VotingRoundError::LastEstimateBetterThanPrevote {
                estimate: *last_estimate,
                prevote: head,
            });
        }
        Ok(head)
    }

    /// Block the local voter precommits for, once the prevote ghost extends `last_estimate`.
    pub fn precommit_target(
        &self,
        tree: &BlockTree,
        last_estimate: &BlockInfo,
    ) -> Option<BlockInfo> {
        self.state.prevote_ghost.filter(|ghost| tree.is_ancestor_or_self(last_estimate, ghost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, B256};
    use kestrel_blocktree::{EpochDigest, VoterId};

    fn info(byte: u8, number: u64) -> BlockInfo {
        BlockInfo::new(B256::repeat_byte(byte), number)
    }

    fn voter(i: u8) -> VoterId {
        Address::repeat_byte(i)
    }

    fn voters() -> VoterSet {
        VoterSet::new((1..=4).map(|i| (voter(i), 1)))
    }

    fn vote(block: BlockInfo, i: u8) -> Vote {
        Vote::local(block, voter(i))
    }

    /// A(0) -> B(1), C(1); B -> D(2)
    fn sample_tree() -> BlockTree {
        let digest = EpochDigest::new(voters().voters().map(|(v, w)| (*v, w)).collect());
        let mut tree = BlockTree::new(info(0xA, 0), 0, digest, None, None);
        tree.insert(info(0xA, 0).hash, info(0xB, 1).hash, 1, 0, None).unwrap();
        tree.insert(info(0xA, 0).hash, info(0xC, 1).hash, 1, 0, None).unwrap();
        tree.insert(info(0xB, 1).hash, info(0xD, 2).hash, 2, 0, None).unwrap();
        tree
    }

    fn round() -> VotingRound {
        VotingRound::new(1, info(0xA, 0), voters())
    }

    #[test]
    fn test_precommit_ghost_resolves_to_deepest_supermajority() {
        let tree = sample_tree();
        let mut round = round();
        for i in 1..=4 {
            round.import_prevote(&tree, vote(info(0xD, 2), i)).unwrap();
        }
        assert_eq!(round.prevote_ghost(), Some(info(0xD, 2)));

        for i in 1..=3 {
            round.import_precommit(&tree, vote(info(0xD, 2), i)).unwrap();
        }
        round.import_precommit(&tree, vote(info(0xC, 1), 4)).unwrap();

        assert_eq!(round.finalized(), Some(info(0xD, 2)));
        assert_eq!(round.estimate(), Some(info(0xD, 2)));
        assert!(round.completable());
        assert_eq!(round.finalizable_candidate(&info(0xA, 0)), Ok(info(0xD, 2)));
    }

    #[test]
    fn test_split_prevotes_ghost_at_common_ancestor() {
        let tree = sample_tree();
        let mut round = round();
        round.import_prevote(&tree, vote(info(0xD, 2), 1)).unwrap();
        round.import_prevote(&tree, vote(info(0xD, 2), 2)).unwrap();
        assert_eq!(round.prevote_ghost(), None);
        round.import_prevote(&tree, vote(info(0xC, 1), 3)).unwrap();
        round.import_prevote(&tree, vote(info(0xC, 1), 4)).unwrap();

        assert_eq!(round.prevote_ghost(), Some(info(0xA, 0)));
        assert_eq!(round.estimate(), Some(info(0xA, 0)));
        assert_eq!(
            round.finalizable_candidate(&info(0xA, 0)),
            Err(VotingRoundError::RoundIsNotFinalizable)
        );
    }

    #[test]
    fn test_equivocation_excludes_both_votes() {
        let tree = sample_tree();
        let mut round = round();
        for i in 1..=4 {
            round.import_prevote(&tree, vote(info(0xD, 2), i)).unwrap();
        }

        assert_eq!(round.import_precommit(&tree, vote(info(0xC, 1), 1)), Ok(VoteImport::Imported));
        let outcome = round.import_precommit(&tree, vote(info(0xD, 2), 1)).unwrap();
        let VoteImport::Equivocated(equivocation) = outcome else {
            panic!("expected equivocation")
        };
        assert_eq!(equivocation.voter, voter(1));
        assert_eq!(equivocation.kind, VoteKind::Precommit);
        assert_eq!(equivocation.first.block, info(0xC, 1));
        assert_eq!(equivocation.second.block, info(0xD, 2));

        assert_eq!(
            round.import_precommit(&tree, vote(info(0xB, 1), 1)),
            Err(VotingRoundError::RedundantEquivocation(voter(1)))
        );

        // the equivocator no longer counts, two honest precommits are not enough
        round.import_precommit(&tree, vote(info(0xD, 2), 2)).unwrap();
        round.import_precommit(&tree, vote(info(0xD, 2), 3)).unwrap();
        assert_eq!(round.finalized(), None);

        round.import_precommit(&tree, vote(info(0xD, 2), 4)).unwrap();
        assert_eq!(round.finalized(), Some(info(0xD, 2)));
    }

    #[test]
    fn test_duplicate_vote_is_noop() {
        let tree = sample_tree();
        let mut round = round();
        round.import_prevote(&tree, vote(info(0xD, 2), 1)).unwrap();
        let before = round.state().clone();

        assert_eq!(round.import_prevote(&tree, vote(info(0xD, 2), 1)), Ok(VoteImport::Duplicated));
        assert_eq!(round.state(), &before);
    }

    #[test]
    fn test_rejected_votes() {
        let tree = sample_tree();
        let mut round = round();

        assert_eq!(
            round.import_prevote(&tree, vote(info(0xD, 2), 9)),
            Err(VotingRoundError::UnknownVoter(voter(9)))
        );

        let unsigned = Vote::new(info(0xD, 2), voter(1), Bytes::new(), false);
        assert_eq!(
            round.import_prevote(&tree, unsigned),
            Err(VotingRoundError::InvalidSignature(voter(1)))
        );

        let unknown_block = round.import_prevote(&tree, vote(info(0xE, 3), 1)).unwrap_err();
        assert!(matches!(
            unknown_block,
            VotingRoundError::Chain(BlockTreeError::NoChainBetweenBlocks { .. })
        ));
        assert!(!round.has_prevoted(&voter(1)));

        let voters = VoterSet::new([(voter(1), 0), (voter(2), 1)]);
        let mut zero = VotingRound::new(1, info(0xA, 0), voters);
        assert_eq!(
            zero.import_prevote(&tree, vote(info(0xD, 2), 1)),
            Err(VotingRoundError::ZeroWeightVoter(voter(1)))
        );
    }

    #[test]
    fn test_state_is_order_independent() {
        let tree = sample_tree();
        let votes = [
            (VoteKind::Prevote, vote(info(0xD, 2), 1)),
            (VoteKind::Prevote, vote(info(0xD, 2), 2)),
            (VoteKind::Prevote, vote(info(0xB, 1), 3)),
            (VoteKind::Precommit, vote(info(0xB, 1), 1)),
            (VoteKind::Precommit, vote(info(0xD, 2), 2)),
            (VoteKind::Precommit, vote(info(0xB, 1), 3)),
        ];

        let apply = |order: &[usize]| {
            let mut round = round();
            for i in order {
                let (kind, vote) = votes[*i].clone();
                match kind {
                    VoteKind::Prevote => round.import_prevote(&tree, vote).unwrap(),
                    VoteKind::Precommit => round.import_precommit(&tree, vote).unwrap(),
                };
            }
            round.state().clone()
        };

        let forward = apply(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(forward, apply(&[5, 4, 3, 2, 1, 0]));
        assert_eq!(forward, apply(&[3, 0, 5, 1, 4, 2]));
        assert_eq!(forward.prevote_ghost, Some(info(0xB, 1)));
        assert_eq!(forward.finalized, Some(info(0xB, 1)));
    }

    #[test]
    fn test_no_prevote_candidate() {
        let round = round();
        assert_eq!(
            round.finalizable_candidate(&info(0xA, 0)),
            Err(VotingRoundError::NoPrevoteCandidate)
        );
    }

    fn settled_round(tree: &BlockTree) -> VotingRound {
        let mut round = round();
        for i in 1..=4 {
            round.import_prevote(tree, vote(info(0xD, 2), i)).unwrap();
        }
        round
    }

    #[test]
    fn test_verify_justification() {
        let tree = sample_tree();
        let round = settled_round(&tree);
        let justification = |precommits: Vec<Vote>| Justification {
            round: 1,
            target: info(0xB, 1),
            precommits,
        };

        let valid = justification(vec![
            vote(info(0xD, 2), 1),
            vote(info(0xB, 1), 2),
            vote(info(0xD, 2), 3),
        ]);
        assert_eq!(round.verify_justification(&tree, &valid), Ok(3));

        let short = justification(vec![vote(info(0xD, 2), 1), vote(info(0xD, 2), 2)]);
        assert_eq!(
            round.verify_justification(&tree, &short),
            Err(VotingRoundError::NotEnoughWeight { weight: 2, threshold: 3 })
        );

        let duplicated = justification(vec![vote(info(0xD, 2), 1), vote(info(0xD, 2), 1)]);
        assert_eq!(
            round.verify_justification(&tree, &duplicated),
            Err(VotingRoundError::DuplicatedVote(voter(1)))
        );

        let equivocated = justification(vec![
            vote(info(0xD, 2), 1),
            vote(info(0xB, 1), 1),
            vote(info(0xD, 2), 2),
            vote(info(0xD, 2), 3),
        ]);
        assert_eq!(
            round.verify_justification(&tree, &equivocated),
            Err(VotingRoundError::EquivocatedVote(voter(1)))
        );

        let off_target = justification(vec![
            vote(info(0xC, 1), 1),
            vote(info(0xD, 2), 2),
            vote(info(0xD, 2), 3),
        ]);
        assert!(matches!(
            round.verify_justification(&tree, &off_target),
            Err(VotingRoundError::Chain(_))
        ));
    }

    #[test]
    fn test_justification_of_known_equivocator() {
        let tree = sample_tree();
        let mut round = settled_round(&tree);
        round.import_precommit(&tree, vote(info(0xC, 1), 1)).unwrap();
        round.import_precommit(&tree, vote(info(0xD, 2), 1)).unwrap();

        let justification = Justification {
            round: 1,
            target: info(0xD, 2),
            precommits: vec![vote(info(0xD, 2), 1), vote(info(0xD, 2), 2), vote(info(0xD, 2), 3)],
        };
        assert_eq!(
            round.verify_justification(&tree, &justification),
            Err(VotingRoundError::VoteOfKnownEquivocator(voter(1)))
        );
    }

    #[test]
    fn test_apply_justification() {
        let tree = sample_tree();
        let mut round = settled_round(&tree);

        let justification = Justification {
            round: 1,
            target: info(0xD, 2),
            precommits: vec![vote(info(0xD, 2), 1), vote(info(0xD, 2), 2), vote(info(0xD, 2), 3)],
        };
        assert_eq!(round.apply_justification(&tree, &justification), Ok(Vec::new()));
        assert_eq!(round.finalized(), Some(info(0xD, 2)));
        assert!(round.has_precommitted(&voter(3)));

        let rebuilt = round.justification_for(&tree, &info(0xD, 2));
        assert_eq!(rebuilt, justification);
    }

    #[test]
    fn test_justification_exposes_local_conflict() {
        let tree = sample_tree();
        let mut round = settled_round(&tree);
        round.import_precommit(&tree, vote(info(0xC, 1), 4)).unwrap();

        let justification = Justification {
            round: 1,
            target: info(0xB, 1),
            precommits: vec![
                vote(info(0xB, 1), 1),
                vote(info(0xD, 2), 2),
                vote(info(0xD, 2), 3),
                vote(info(0xD, 2), 4),
            ],
        };
        let equivocations = round.apply_justification(&tree, &justification).unwrap();
        assert_eq!(equivocations.len(), 1);
        assert_eq!(equivocations[0].voter, voter(4));
        assert_eq!(round.finalized(), Some(info(0xB, 1)));
    }

    #[test]
    fn test_justification_beyond_local_support() {
        let tree = sample_tree();
        let mut round = settled_round(&tree);
        // locally, voters 1 and 2 precommitted on the other branch
        round.import_precommit(&tree, vote(info(0xC, 1), 1)).unwrap();
        round.import_precommit(&tree, vote(info(0xC, 1), 2)).unwrap();

        let justification = Justification {
            round: 1,
            target: info(0xD, 2),
            precommits: vec![vote(info(0xD, 2), 2), vote(info(0xD, 2), 3), vote(info(0xD, 2), 4)],
        };
        assert_eq!(
            round.apply_justification(&tree, &justification),
            Err(VotingRoundError::JustifiedBlockIsGreaterThanActuallyFinalized {
                justified: info(0xD, 2)
            })
        );
        assert!(!round.has_precommitted(&voter(3)));
    }

    #[test]
    fn test_local_targets() {
        let tree = sample_tree();
        let round = round();

        assert_eq!(round.prevote_target(&tree, &info(0xA, 0)), Ok(info(0xD, 2)));
        assert_eq!(round.prevote_target(&tree, &info(0xC, 1)), Ok(info(0xC, 1)));
        assert!(matches!(
            round.prevote_target(&tree, &info(0xE, 5)),
            Err(VotingRoundError::LastEstimateBetterThanPrevote { .. })
        ));

        assert_eq!(round.precommit_target(&tree, &info(0xA, 0)), None);
        let settled = settled_round(&tree);
        assert_eq!(settled.precommit_target(&tree, &info(0xB, 1)), Some(info(0xD, 2)));
        assert_eq!(settled.precommit_target(&tree, &info(0xC, 1)), None);
    }

    #[test]
    fn test_genesis_round_is_settled() {
        let tree = sample_tree();
        let mut genesis = VotingRound::genesis(info(0xA, 0), voters());
        assert!(genesis.completable());
        assert_eq!(genesis.estimate(), Some(info(0xA, 0)));
        assert!(!genesis.recompute(&tree));
    }
}
