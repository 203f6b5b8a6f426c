//! Chain of voting rounds driving finalization of the block tree.

use crate::{
    Environment, Equivocation, FinalityConfig, FinalityError, Justification, OutboundMessage,
    RoundNumber, Vote, VoteImport, VoteKind, VoterSet, VotingRound, VotingRoundError,
};
use kestrel_blocktree::{BlockInfo, BlockTree, VoterId};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Rounds kept in memory, oldest first, plus the local voting record.
#[derive(Debug)]
pub struct RoundChain<E> {
    rounds: BTreeMap<RoundNumber, VotingRound>,
    env: E,
    local_voter: Option<VoterId>,
    rounds_to_keep: usize,
    last_finalized_round: RoundNumber,
    voted: HashSet<(RoundNumber, VoteKind)>,
}

impl<E: Environment> RoundChain<E> {
    /// Settle a genesis round on the tree root and start round one.
    pub fn new(
        tree: &mut BlockTree,
        env: E,
        config: &FinalityConfig,
    ) -> Result<Self, FinalityError> {
        let root = tree.root_info();
        let voters = resolve_voters(&env, tree, &root)?;

        let mut rounds = BTreeMap::new();
        rounds.insert(0, VotingRound::genesis(root, voters));
        let mut chain = Self {
            rounds,
            env,
            local_voter: config.local_voter,
            rounds_to_keep: config.rounds_to_keep.max(2),
            last_finalized_round: 0,
            voted: HashSet::new(),
        };
        chain.execute_next_round(tree, 0)?;
        Ok(chain)
    }

    /// The collaborator seams
    pub const fn env(&self) -> &E {
        &self.env
    }

    /// Most recent round
    pub fn latest_round(&self) -> RoundNumber {
        self.rounds.keys().next_back().copied().unwrap_or_default()
    }

    /// Oldest round still kept
    pub fn oldest_round(&self) -> RoundNumber {
        self.rounds.keys().next().copied().unwrap_or_default()
    }

    /// Last round that moved the tree root
    pub const fn last_finalized_round(&self) -> RoundNumber {
        self.last_finalized_round
    }

    /// Look up a kept round
    pub fn round(&self, number: RoundNumber) -> Option<&VotingRound> {
        self.rounds.get(&number)
    }

    /// Start round `round_number + 1` from the outcome of `round_number`.
    ///
    /// Returns the number of the started round. Starting an existing round is a no-op.
    pub fn execute_next_round(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
    ) -> Result<RoundNumber, FinalityError> {
        let next = round_number.checked_add(1).ok_or(FinalityError::UnknownRound(round_number))?;
        if self.rounds.contains_key(&next) {
            return Ok(next);
        }
        let base = self.next_base(tree, round_number)?;

        let voters = resolve_voters(&self.env, tree, &base)?;
        info!(
            target: "kestrel::chain",
            round = next,
            %base,
            voters = voters.len(),
            threshold = voters.threshold(),
            "Starting round"
        );
        self.rounds.insert(next, VotingRound::new(next, base, voters));
        self.prune_rounds();

        self.on_round_changed(tree, next, false)?;
        Ok(next)
    }

    /// Re-derive round `round_number + 1` after `round_number` changed, keeping its votes.
    ///
    /// A live next round moves onto the current outcome of `round_number` and takes the
    /// voters active at that block. A next round whose base was pruned stays frozen.
    pub fn update_next_round(
        &mut self,
        tree: &BlockTree,
        round_number: RoundNumber,
    ) -> Option<RoundNumber> {
        let next = round_number.checked_add(1)?;
        let current_base = self.rounds.get(&next)?.base();
        let outcome = self
            .rounds
            .get(&round_number)
            .and_then(|previous| previous.estimate().or_else(|| previous.finalized()))
            .filter(|block| tree.contains(&block.hash));

        let rebase = match outcome {
            Some(base) if base != current_base && tree.contains(&current_base.hash) => {
                match resolve_voters(&self.env, tree, &base) {
                    Ok(voters) => Some((base, voters)),
                    Err(err) => {
                        warn!(
                            target: "kestrel::chain",
                            round = next,
                            %base,
                            %err,
                            "Keeping round base"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        let round = self.rounds.get_mut(&next)?;
        match rebase {
            Some((base, voters)) => round.rebase(tree, base, voters),
            None => round.recompute(tree),
        };
        Some(next)
    }

    /// Block the round after `round_number` builds on: its estimate, else its finalized
    /// block, else the tree root.
    fn next_base(
        &self,
        tree: &BlockTree,
        round_number: RoundNumber,
    ) -> Result<BlockInfo, FinalityError> {
        let previous =
            self.rounds.get(&round_number).ok_or(FinalityError::UnknownRound(round_number))?;
        Ok(previous
            .estimate()
            .or_else(|| previous.finalized())
            .filter(|block| tree.contains(&block.hash))
            .unwrap_or_else(|| tree.root_info()))
    }

    /// Advance past the latest round regardless of its state.
    pub fn advance(&mut self, tree: &mut BlockTree) -> Result<RoundNumber, FinalityError> {
        let latest = self.latest_round();
        debug!(target: "kestrel::chain", round = latest, "Advancing round");
        self.execute_next_round(tree, latest)
    }

    /// Import a prevote into a kept round.
    pub fn import_prevote(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
        vote: Vote,
    ) -> Result<VoteImport, FinalityError> {
        self.import_vote(tree, round_number, VoteKind::Prevote, vote)
    }

    /// Import a precommit into a kept round.
    pub fn import_precommit(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
        vote: Vote,
    ) -> Result<VoteImport, FinalityError> {
        self.import_vote(tree, round_number, VoteKind::Precommit, vote)
    }

    fn import_vote(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
        kind: VoteKind,
        vote: Vote,
    ) -> Result<VoteImport, FinalityError> {
        let round = self.kept_round_mut(round_number)?;
        let outcome = match kind {
            VoteKind::Prevote => round.import_prevote(tree, vote)?,
            VoteKind::Precommit => round.import_precommit(tree, vote)?,
        };

        match &outcome {
            VoteImport::Duplicated => return Ok(outcome),
            VoteImport::Equivocated(equivocation) => self.report(equivocation),
            VoteImport::Imported => {}
        }
        self.on_round_changed(tree, round_number, true)?;
        Ok(outcome)
    }

    /// Verify and apply a justification received from the network.
    ///
    /// A justification for a round not started yet opens that round on the tree root.
    pub fn apply_justification(
        &mut self,
        tree: &mut BlockTree,
        justification: Justification,
    ) -> Result<(), FinalityError> {
        let root = tree.root_info();
        let round_number = justification.round;
        if round_number.checked_add(1).is_none() {
            return Err(FinalityError::UnknownRound(round_number));
        }
        if justification.target.number <= root.number {
            return Err(VotingRoundError::JustificationForBlockInPast {
                block: justification.target,
                finalized: root,
            }
            .into());
        }
        let in_past = round_number < self.last_finalized_round ||
            (!self.rounds.contains_key(&round_number) && round_number < self.latest_round());
        if in_past {
            return Err(VotingRoundError::JustificationForRoundInPast {
                round: round_number,
                last_finalized_round: self.last_finalized_round,
            }
            .into());
        }

        if !self.rounds.contains_key(&round_number) {
            let voters = resolve_voters(&self.env, tree, &root)?;
            info!(
                target: "kestrel::chain",
                round = round_number,
                base = %root,
                "Catching up to round"
            );
            self.rounds.insert(round_number, VotingRound::new(round_number, root, voters));
            self.prune_rounds();
        }
        let round = self.kept_round_mut(round_number)?;

        let equivocations = round.apply_justification(tree, &justification).inspect_err(|err| {
            warn!(
                target: "kestrel::chain",
                round = round_number,
                target_block = %justification.target,
                %err,
                "Rejected justification"
            );
        })?;
        for equivocation in &equivocations {
            self.report(equivocation);
        }

        let target = justification.target;
        self.finalize_block(tree, round_number, &target, justification, false)?;
        self.on_round_changed(tree, round_number, false)?;
        if round_number == self.latest_round() {
            self.execute_next_round(tree, round_number)?;
        }
        Ok(())
    }

    /// Re-derive every kept round after the tree changed.
    pub fn on_tree_changed(&mut self, tree: &mut BlockTree) -> Result<(), FinalityError> {
        let oldest = self.oldest_round();
        if let Some(round) = self.rounds.get_mut(&oldest) {
            round.recompute(tree);
        }
        self.on_round_changed(tree, oldest, true)
    }

    /// Propagate a change of round `round_number` through the rounds after it.
    fn on_round_changed(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
        allow_advance: bool,
    ) -> Result<(), FinalityError> {
        let mut current = round_number;
        loop {
            self.cast_local_votes(tree, current)?;
            self.try_finalize(tree, current)?;
            match self.update_next_round(tree, current) {
                Some(next) => current = next,
                None => break,
            }
        }

        let advance = allow_advance &&
            self.rounds.get(&current).is_some_and(VotingRound::completable) &&
            current == self.latest_round();
        if advance {
            self.execute_next_round(tree, current)?;
        }
        Ok(())
    }

    fn cast_local_votes(
        &mut self,
        tree: &BlockTree,
        round_number: RoundNumber,
    ) -> Result<(), FinalityError> {
        let Some(local) = self.local_voter else { return Ok(()) };
        if round_number == 0 {
            return Ok(());
        }
        let Some(round) = self.rounds.get(&round_number) else { return Ok(()) };
        if !round.voters().contains(&local) {
            return Ok(());
        }
        let last_estimate = round.base();

        if !self.voted.contains(&(round_number, VoteKind::Prevote)) {
            match round.prevote_target(tree, &last_estimate) {
                Ok(target) => {
                    self.cast_local_vote(tree, round_number, VoteKind::Prevote, target)?
                }
                Err(err) => {
                    debug!(target: "kestrel::chain", round = round_number, %err, "Not prevoting")
                }
            }
        }

        let precommit_target = self
            .rounds
            .get(&round_number)
            .and_then(|round| round.precommit_target(tree, &last_estimate));
        if let Some(target) = precommit_target {
            if !self.voted.contains(&(round_number, VoteKind::Precommit)) {
                self.cast_local_vote(tree, round_number, VoteKind::Precommit, target)?;
            }
        }
        Ok(())
    }

    fn cast_local_vote(
        &mut self,
        tree: &BlockTree,
        round_number: RoundNumber,
        kind: VoteKind,
        target: BlockInfo,
    ) -> Result<(), FinalityError> {
        let Some(local) = self.local_voter else { return Ok(()) };
        let vote = Vote::local(target, local);
        self.voted.insert((round_number, kind));

        let round = self.kept_round_mut(round_number)?;
        let imported = match kind {
            VoteKind::Prevote => round.import_prevote(tree, vote.clone()),
            VoteKind::Precommit => round.import_precommit(tree, vote.clone()),
        };
        if let Err(err) = imported {
            warn!(
                target: "kestrel::chain",
                round = round_number,
                %kind,
                %err,
                "Local vote rejected"
            );
            return Ok(());
        }

        info!(target: "kestrel::chain", round = round_number, %kind, %target, "Casting vote");
        let message = match kind {
            VoteKind::Prevote => OutboundMessage::Prevote(vote),
            VoteKind::Precommit => OutboundMessage::Precommit(vote),
        };
        self.env.broadcast(message);
        Ok(())
    }

    fn try_finalize(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
    ) -> Result<(), FinalityError> {
        let root = tree.root_info();
        let Some(round) = self.rounds.get(&round_number) else { return Ok(()) };
        let candidate = match round.finalizable_candidate(&root) {
            Ok(candidate) => candidate,
            Err(VotingRoundError::NoPrevoteCandidate | VotingRoundError::RoundIsNotFinalizable) => {
                return Ok(())
            }
            Err(err) => return Err(err.into()),
        };
        if !tree.contains(&candidate.hash) {
            return Ok(());
        }

        let justification = round.justification_for(tree, &candidate);
        self.finalize_block(tree, round_number, &candidate, justification, true)
    }

    fn finalize_block(
        &mut self,
        tree: &mut BlockTree,
        round_number: RoundNumber,
        block: &BlockInfo,
        justification: Justification,
        broadcast: bool,
    ) -> Result<(), FinalityError> {
        let finalized = tree.finalize(&block.hash, Some(justification.encode()?))?;
        if finalized.pruned.is_empty() {
            return Ok(());
        }
        self.last_finalized_round = self.last_finalized_round.max(round_number);
        info!(
            target: "kestrel::chain",
            round = round_number,
            block = %finalized.new_root,
            precommits = justification.precommits.len(),
            "Finalized block"
        );

        self.env.finalized(&finalized, &justification);
        if broadcast {
            self.env.broadcast(OutboundMessage::Commit(justification));
        }
        Ok(())
    }

    fn report(&self, equivocation: &Equivocation) {
        warn!(
            target: "kestrel::chain",
            round = equivocation.round,
            kind = %equivocation.kind,
            voter = %equivocation.voter,
            first = %equivocation.first.block,
            second = %equivocation.second.block,
            "Equivocation detected"
        );
        self.env.report_equivocation(equivocation);
    }

    fn kept_round_mut(
        &mut self,
        round_number: RoundNumber,
    ) -> Result<&mut VotingRound, FinalityError> {
        if !self.rounds.contains_key(&round_number) {
            return Err(if round_number < self.latest_round() {
                FinalityError::RoundInPast { round: round_number, oldest: self.oldest_round() }
            } else {
                FinalityError::UnknownRound(round_number)
            });
        }
        self.rounds.get_mut(&round_number).ok_or(FinalityError::UnknownRound(round_number))
    }

    fn prune_rounds(&mut self) {
        while self.rounds.len() > self.rounds_to_keep {
            if let Some((number, _)) = self.rounds.pop_first() {
                debug!(target: "kestrel::chain", round = number, "Dropped round");
            }
        }
        let oldest = self.oldest_round();
        self.voted.retain(|(round, _)| *round >= oldest);
    }
}

fn resolve_voters<E: Environment>(
    env: &E,
    tree: &BlockTree,
    block: &BlockInfo,
) -> Result<VoterSet, VotingRoundError> {
    env.voter_set(tree, block)
        .filter(|voters| !voters.is_empty())
        .ok_or(VotingRoundError::NoKnownAuthoritiesForBlock(*block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingEnvironment;
    use alloy_primitives::{Address, Bytes, B256};
    use kestrel_blocktree::EpochDigest;

    fn info(byte: u8, number: u64) -> BlockInfo {
        BlockInfo::new(B256::repeat_byte(byte), number)
    }

    fn voter(i: u8) -> VoterId {
        Address::repeat_byte(i)
    }

    fn vote(block: BlockInfo, i: u8) -> Vote {
        Vote::local(block, voter(i))
    }

    fn digest(count: u8) -> EpochDigest {
        EpochDigest::new((1..=count).map(|i| (voter(i), 1)).collect())
    }

    /// A(0) -> B(1), C(1); B -> D(2)
    fn sample_tree(count: u8) -> BlockTree {
        let mut tree = BlockTree::new(info(0xA, 0), 0, digest(count), None, None);
        tree.insert(info(0xA, 0).hash, info(0xB, 1).hash, 1, 0, None).unwrap();
        tree.insert(info(0xA, 0).hash, info(0xC, 1).hash, 1, 0, None).unwrap();
        tree.insert(info(0xB, 1).hash, info(0xD, 2).hash, 2, 0, None).unwrap();
        tree
    }

    fn observer(tree: &mut BlockTree) -> RoundChain<RecordingEnvironment> {
        RoundChain::new(tree, RecordingEnvironment::new(), &FinalityConfig::default()).unwrap()
    }

    #[test]
    fn test_votes_finalize_and_advance() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        assert_eq!(chain.latest_round(), 1);

        for i in 1..=4 {
            chain.import_prevote(&mut tree, 1, vote(info(0xD, 2), i)).unwrap();
        }
        for i in 1..=3 {
            chain.import_precommit(&mut tree, 1, vote(info(0xD, 2), i)).unwrap();
        }

        assert_eq!(tree.root_info(), info(0xD, 2));
        assert_eq!(chain.last_finalized_round(), 1);
        assert_eq!(chain.latest_round(), 2);
        assert_eq!(chain.round(2).unwrap().base(), info(0xD, 2));

        let finalized = chain.env().finalized_blocks();
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].finalized.new_root, info(0xD, 2));
        assert_eq!(finalized[0].justification.precommits.len(), 3);
        assert_eq!(
            Justification::decode(tree.meta().last_finalized_justification().unwrap()).unwrap(),
            finalized[0].justification
        );
        assert!(matches!(chain.env().outbound().as_slice(), [OutboundMessage::Commit(_)]));
    }

    #[test]
    fn test_vote_routing_errors() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);

        assert!(matches!(
            chain.import_prevote(&mut tree, 7, vote(info(0xD, 2), 1)),
            Err(FinalityError::UnknownRound(7))
        ));

        for _ in 0..3 {
            chain.advance(&mut tree).unwrap();
        }
        assert_eq!(chain.latest_round(), 4);
        assert_eq!(chain.oldest_round(), 2);
        assert!(matches!(
            chain.import_prevote(&mut tree, 1, vote(info(0xD, 2), 1)),
            Err(FinalityError::RoundInPast { round: 1, oldest: 2 })
        ));

        let err = chain
            .import_prevote(&mut tree, 4, Vote::new(info(0xD, 2), voter(1), Bytes::new(), false))
            .unwrap_err();
        assert!(matches!(err, FinalityError::Round(VotingRoundError::InvalidSignature(_))));
    }

    #[test]
    fn test_equivocation_is_reported() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);

        chain.import_precommit(&mut tree, 1, vote(info(0xC, 1), 1)).unwrap();
        let outcome = chain.import_precommit(&mut tree, 1, vote(info(0xD, 2), 1)).unwrap();
        assert!(matches!(outcome, VoteImport::Equivocated(_)));
        assert!(matches!(
            chain.import_precommit(&mut tree, 1, vote(info(0xB, 1), 1)),
            Err(FinalityError::Round(VotingRoundError::RedundantEquivocation(_)))
        ));

        let reported = chain.env().equivocations();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].voter, voter(1));
    }

    #[test]
    fn test_next_round_follows_previous_changes() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        for i in 1..=4 {
            chain.import_prevote(&mut tree, 1, vote(info(0xB, 1), i)).unwrap();
        }
        chain.advance(&mut tree).unwrap();
        assert_eq!(chain.round(2).unwrap().base(), info(0xB, 1));

        // round 2 already has votes when round 1 finalizes underneath it
        for i in 1..=4 {
            chain.import_prevote(&mut tree, 2, vote(info(0xD, 2), i)).unwrap();
        }
        assert_eq!(chain.round(2).unwrap().prevote_ghost(), Some(info(0xD, 2)));

        for i in 1..=3 {
            chain.import_precommit(&mut tree, 1, vote(info(0xB, 1), i)).unwrap();
        }
        assert_eq!(tree.root_info(), info(0xB, 1));
        assert_eq!(chain.round(2).unwrap().prevote_ghost(), Some(info(0xD, 2)));
        assert_eq!(chain.latest_round(), 2);
    }

    #[test]
    fn test_next_round_rebases_onto_moved_estimate() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        for i in 1..=4 {
            chain.import_prevote(&mut tree, 1, vote(info(0xD, 2), i)).unwrap();
        }
        chain.import_precommit(&mut tree, 1, vote(info(0xD, 2), 1)).unwrap();
        chain.advance(&mut tree).unwrap();
        assert_eq!(chain.round(2).unwrap().base(), info(0xD, 2));
        chain.import_prevote(&mut tree, 2, vote(info(0xD, 2), 4)).unwrap();

        // precommits on the other branch pull the round 1 estimate back to the root
        for i in 2..=3 {
            chain.import_precommit(&mut tree, 1, vote(info(0xC, 1), i)).unwrap();
        }
        assert_eq!(chain.round(1).unwrap().estimate(), Some(info(0xA, 0)));
        assert_eq!(chain.round(2).unwrap().base(), info(0xA, 0));
        assert!(chain.round(2).unwrap().has_prevoted(&voter(4)));

        assert_eq!(
            chain.import_prevote(&mut tree, 2, vote(info(0xC, 1), 1)).unwrap(),
            VoteImport::Imported
        );
        for i in 2..=3 {
            chain.import_prevote(&mut tree, 2, vote(info(0xC, 1), i)).unwrap();
        }
        assert_eq!(chain.round(2).unwrap().prevote_ghost(), Some(info(0xC, 1)));
        assert_eq!(chain.latest_round(), 2);
    }

    #[test]
    fn test_justification_for_last_round_number() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        let justification = Justification {
            round: RoundNumber::MAX,
            target: info(0xB, 1),
            precommits: (1..=3).map(|i| vote(info(0xB, 1), i)).collect(),
        };

        assert!(matches!(
            chain.apply_justification(&mut tree, justification),
            Err(FinalityError::UnknownRound(RoundNumber::MAX))
        ));
        assert_eq!(tree.root_info(), info(0xA, 0));
        assert_eq!(chain.latest_round(), 1);
        assert!(matches!(
            chain.execute_next_round(&mut tree, RoundNumber::MAX),
            Err(FinalityError::UnknownRound(RoundNumber::MAX))
        ));
    }

    #[test]
    fn test_apply_justification() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        let justification = Justification {
            round: 1,
            target: info(0xD, 2),
            precommits: (1..=3).map(|i| vote(info(0xD, 2), i)).collect(),
        };

        chain.apply_justification(&mut tree, justification.clone()).unwrap();
        assert_eq!(tree.root_info(), info(0xD, 2));
        assert_eq!(chain.latest_round(), 2);
        // only locally derived finality is re-broadcast
        assert!(chain.env().outbound().is_empty());

        assert!(matches!(
            chain.apply_justification(&mut tree, justification),
            Err(FinalityError::Round(VotingRoundError::JustificationForBlockInPast { .. }))
        ));
    }

    #[test]
    fn test_justification_for_future_round_catches_up() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        let justification = Justification {
            round: 9,
            target: info(0xB, 1),
            precommits: (1..=3).map(|i| vote(info(0xD, 2), i)).collect(),
        };

        chain.apply_justification(&mut tree, justification).unwrap();
        assert_eq!(tree.root_info(), info(0xB, 1));
        assert_eq!(chain.last_finalized_round(), 9);
        assert_eq!(chain.latest_round(), 10);

        let stale = Justification {
            round: 3,
            target: info(0xD, 2),
            precommits: (1..=3).map(|i| vote(info(0xD, 2), i)).collect(),
        };
        assert!(matches!(
            chain.apply_justification(&mut tree, stale),
            Err(FinalityError::Round(VotingRoundError::JustificationForRoundInPast { .. }))
        ));
    }

    #[test]
    fn test_rejected_justification_leaves_tree() {
        let mut tree = sample_tree(4);
        let mut chain = observer(&mut tree);
        let justification = Justification {
            round: 1,
            target: info(0xD, 2),
            precommits: (1..=2).map(|i| vote(info(0xD, 2), i)).collect(),
        };

        assert!(matches!(
            chain.apply_justification(&mut tree, justification),
            Err(FinalityError::Round(VotingRoundError::NotEnoughWeight { .. }))
        ));
        assert_eq!(tree.root_info(), info(0xA, 0));
    }

    #[test]
    fn test_single_local_voter_finalizes_each_round() {
        let mut tree = BlockTree::new(info(0xA, 0), 0, digest(1), None, None);
        let config = FinalityConfig::default().with_local_voter(voter(1));
        let mut chain = RoundChain::new(&mut tree, RecordingEnvironment::new(), &config).unwrap();

        // nothing beyond the root yet, round one settles on it
        assert_eq!(chain.round(1).unwrap().finalized(), Some(info(0xA, 0)));
        assert_eq!(tree.root_info(), info(0xA, 0));

        tree.insert(info(0xA, 0).hash, info(0xB, 1).hash, 1, 0, None).unwrap();
        chain.on_tree_changed(&mut tree).unwrap();
        chain.advance(&mut tree).unwrap();

        assert_eq!(tree.root_info(), info(0xB, 1));
        let outbound = chain.env().outbound();
        assert!(outbound.iter().any(|message| matches!(
            message,
            OutboundMessage::Precommit(vote) if vote.block == info(0xB, 1)
        )));
        assert!(outbound.iter().any(|message| matches!(message, OutboundMessage::Commit(_))));
    }

    #[test]
    fn test_no_authorities() {
        let mut tree = BlockTree::new(info(0xA, 0), 0, EpochDigest::default(), None, None);
        let err =
            RoundChain::new(&mut tree, RecordingEnvironment::new(), &FinalityConfig::default())
                .unwrap_err();
        assert!(matches!(
            err,
            FinalityError::Round(VotingRoundError::NoKnownAuthoritiesForBlock(_))
        ));
    }
}
