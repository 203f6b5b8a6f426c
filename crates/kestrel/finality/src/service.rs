//! Finality Service
//!
//! Single owner of the block tree and the round chain. Every tree mutation and vote import
//! is a [`FinalityCommand`] processed one at a time, so traversals never observe a tree
//! that is being finalized underneath them.

use crate::{
    Environment, FinalityConfig, FinalityError, Justification, RoundChain, RoundNumber,
    RoundState, Vote, VoteImport,
};
use kestrel_blocktree::{BlockHash, BlockInfo, BlockNumber, BlockTree, EpochDigest, EpochNumber};
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

/// A block handed over by the import pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockImport {
    /// Parent hash
    pub parent_hash: BlockHash,
    /// Block hash
    pub hash: BlockHash,
    /// Block number
    pub number: BlockNumber,
    /// Epoch the block belongs to
    pub epoch_number: EpochNumber,
    /// Authority set announced by the block, if any
    #[serde(default)]
    pub next_epoch_digest: Option<EpochDigest>,
}

/// Point-in-time view of the service state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalitySnapshot {
    /// Finalized root
    pub root: BlockInfo,
    /// Deepest leaf
    pub best: BlockInfo,
    /// Number of leaves
    pub leaves: usize,
    /// Latest round state
    pub round: RoundState,
    /// Last round that moved the root
    pub last_finalized_round: RoundNumber,
}

/// Commands accepted by the [`FinalityService`]
#[derive(Debug)]
pub enum FinalityCommand {
    /// Import a block into the tree
    ImportBlock {
        /// The block
        block: BlockImport,
        /// Response channel
        response: oneshot::Sender<Result<(), FinalityError>>,
    },
    /// Remove an invalid block and its descendants
    RemoveBlock {
        /// Block hash
        hash: BlockHash,
        /// Response channel, receives the removed blocks
        response: oneshot::Sender<Result<Vec<BlockInfo>, FinalityError>>,
    },
    /// Import a prevote
    Prevote {
        /// Round number
        round: RoundNumber,
        /// The vote
        vote: Vote,
        /// Response channel
        response: oneshot::Sender<Result<VoteImport, FinalityError>>,
    },
    /// Import a precommit
    Precommit {
        /// Round number
        round: RoundNumber,
        /// The vote
        vote: Vote,
        /// Response channel
        response: oneshot::Sender<Result<VoteImport, FinalityError>>,
    },
    /// Apply a justification received from a peer
    Justification {
        /// The justification
        justification: Justification,
        /// Response channel
        response: oneshot::Sender<Result<(), FinalityError>>,
    },
    /// Start the next round regardless of the latest round state
    AdvanceRound {
        /// Response channel, receives the started round
        response: oneshot::Sender<Result<RoundNumber, FinalityError>>,
    },
    /// Query the current state
    State {
        /// Response channel
        response: oneshot::Sender<FinalitySnapshot>,
    },
}

/// Cloneable front-end of a running [`FinalityService`].
#[derive(Debug, Clone)]
pub struct FinalityHandle {
    commands: mpsc::Sender<FinalityCommand>,
}

impl FinalityHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> FinalityCommand,
    ) -> Result<T, FinalityError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(command(tx)).await.map_err(|_| FinalityError::ServiceStopped)?;
        rx.await.map_err(|_| FinalityError::ServiceStopped)
    }

    /// Import a block
    pub async fn import_block(&self, block: BlockImport) -> Result<(), FinalityError> {
        self.request(|response| FinalityCommand::ImportBlock { block, response }).await?
    }

    /// Remove a block and its descendants
    pub async fn remove_block(&self, hash: BlockHash) -> Result<Vec<BlockInfo>, FinalityError> {
        self.request(|response| FinalityCommand::RemoveBlock { hash, response }).await?
    }

    /// Import a prevote
    pub async fn prevote(
        &self,
        round: RoundNumber,
        vote: Vote,
    ) -> Result<VoteImport, FinalityError> {
        self.request(|response| FinalityCommand::Prevote { round, vote, response }).await?
    }

    /// Import a precommit
    pub async fn precommit(
        &self,
        round: RoundNumber,
        vote: Vote,
    ) -> Result<VoteImport, FinalityError> {
        self.request(|response| FinalityCommand::Precommit { round, vote, response }).await?
    }

    /// Apply a justification
    pub async fn justification(&self, justification: Justification) -> Result<(), FinalityError> {
        self.request(|response| FinalityCommand::Justification { justification, response }).await?
    }

    /// Advance to the next round
    pub async fn advance_round(&self) -> Result<RoundNumber, FinalityError> {
        self.request(|response| FinalityCommand::AdvanceRound { response }).await?
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> Result<FinalitySnapshot, FinalityError> {
        self.request(|response| FinalityCommand::State { response }).await
    }
}

/// Actor owning the block tree and the round chain.
#[derive(Debug)]
pub struct FinalityService<E> {
    tree: BlockTree,
    chain: RoundChain<E>,
    commands: mpsc::Receiver<FinalityCommand>,
    round_timeout: Duration,
}

impl<E: Environment> FinalityService<E> {
    /// Create the service and its handle. Round one starts immediately.
    pub fn new(
        mut tree: BlockTree,
        env: E,
        config: &FinalityConfig,
    ) -> Result<(Self, FinalityHandle), FinalityError> {
        config.validate()?;
        let chain = RoundChain::new(&mut tree, env, config)?;
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let service = Self { tree, chain, commands: rx, round_timeout: config.round_timeout };
        Ok((service, FinalityHandle { commands: tx }))
    }

    /// Process commands until every handle is dropped.
    ///
    /// The round timer restarts whenever a new round begins. When it fires the chain moves on
    /// to the next round even if the latest one is not completable.
    pub async fn run(mut self) {
        info!(
            target: "kestrel::service",
            round = self.chain.latest_round(),
            root = %self.tree.root_info(),
            "Finality service started"
        );

        let timer = sleep(self.round_timeout);
        tokio::pin!(timer);
        let mut timed_round = self.chain.latest_round();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.on_command(command);
                }
                () = &mut timer => {
                    debug!(target: "kestrel::service", round = timed_round, "Round timer expired");
                    if let Err(err) = self.chain.advance(&mut self.tree) {
                        warn!(target: "kestrel::service", %err, "Failed to advance round");
                    }
                    timed_round = self.chain.latest_round();
                    timer.as_mut().reset(Instant::now() + self.round_timeout);
                    continue;
                }
            }

            let latest = self.chain.latest_round();
            if latest != timed_round {
                timed_round = latest;
                timer.as_mut().reset(Instant::now() + self.round_timeout);
            }
        }

        info!(
            target: "kestrel::service",
            root = %self.tree.root_info(),
            "Finality service stopped"
        );
    }

    fn on_command(&mut self, command: FinalityCommand) {
        match command {
            FinalityCommand::ImportBlock { block, response } => {
                let _ = response.send(self.import_block(block));
            }
            FinalityCommand::RemoveBlock { hash, response } => {
                let _ = response.send(self.remove_block(&hash));
            }
            FinalityCommand::Prevote { round, vote, response } => {
                let _ = response.send(self.chain.import_prevote(&mut self.tree, round, vote));
            }
            FinalityCommand::Precommit { round, vote, response } => {
                let _ = response.send(self.chain.import_precommit(&mut self.tree, round, vote));
            }
            FinalityCommand::Justification { justification, response } => {
                let applied = self.chain.apply_justification(&mut self.tree, justification);
                let _ = response.send(applied);
            }
            FinalityCommand::AdvanceRound { response } => {
                let _ = response.send(self.chain.advance(&mut self.tree));
            }
            FinalityCommand::State { response } => {
                let _ = response.send(self.snapshot());
            }
        }
    }

    fn import_block(&mut self, block: BlockImport) -> Result<(), FinalityError> {
        self.tree.insert(
            block.parent_hash,
            block.hash,
            block.number,
            block.epoch_number,
            block.next_epoch_digest,
        )?;
        self.chain.on_tree_changed(&mut self.tree)
    }

    fn remove_block(&mut self, hash: &BlockHash) -> Result<Vec<BlockInfo>, FinalityError> {
        let removed = self.tree.remove_leaf_or_subtree(hash)?;
        self.chain.on_tree_changed(&mut self.tree)?;
        Ok(removed)
    }

    fn snapshot(&self) -> FinalitySnapshot {
        let latest = self.chain.latest_round();
        let round = self
            .chain
            .round(latest)
            .map(|round| round.state().clone())
            .unwrap_or_else(|| RoundState {
                round_number: latest,
                prevote_ghost: None,
                estimate: None,
                finalized: None,
                completable: false,
            });
        FinalitySnapshot {
            root: self.tree.root_info(),
            best: self.tree.deepest_leaf(),
            leaves: self.tree.leaves().len(),
            round,
            last_finalized_round: self.chain.last_finalized_round(),
        }
    }
}

/// Create the service and return its handle together with the future running it.
pub fn spawn_finality_service<E>(
    tree: BlockTree,
    env: E,
    config: &FinalityConfig,
) -> Result<(FinalityHandle, impl Future<Output = ()> + use<E>), FinalityError>
where
    E: Environment + Send + 'static,
{
    let (service, handle) = FinalityService::new(tree, env, config)?;
    Ok((handle, service.run()))
}
