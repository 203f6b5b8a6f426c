//! Collaborator seams of the round chain: voter resolution, storage pruning, transport and
//! misbehavior reporting.

use crate::{Equivocation, Justification, Vote, VoterSet};
use kestrel_blocktree::{BlockInfo, BlockTree, FinalizedBlocks};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Message produced by the gadget for the transport to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundMessage {
    /// Local prevote
    Prevote(Vote),
    /// Local precommit
    Precommit(Vote),
    /// Justification of a block finalized from local votes
    Commit(Justification),
}

/// Notification sent after the tree root moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalityNotification {
    /// New root and every pruned block
    pub finalized: FinalizedBlocks,
    /// Proof of finality
    pub justification: Justification,
}

/// Everything the round chain needs from the rest of the node.
pub trait Environment {
    /// Voter set active at `block`.
    ///
    /// Defaults to the authorities of the epoch the block belongs to.
    fn voter_set(&self, tree: &BlockTree, block: &BlockInfo) -> Option<VoterSet> {
        tree.get(&block.hash)
            .filter(|node| node.number() == block.number)
            .map(|node| VoterSet::from_digest(node.epoch_digest()))
    }

    /// The tree root moved; data below the new root can be pruned.
    fn finalized(&self, finalized: &FinalizedBlocks, justification: &Justification);

    /// Send a message to the network.
    fn broadcast(&self, message: OutboundMessage);

    /// A voter signed conflicting votes.
    fn report_equivocation(&self, equivocation: &Equivocation);
}

/// [`Environment`] forwarding everything to unbounded channels.
#[derive(Debug, Clone)]
pub struct ChannelEnvironment {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    notifications: mpsc::UnboundedSender<FinalityNotification>,
    equivocations: mpsc::UnboundedSender<Equivocation>,
}

/// Receiving halves of a [`ChannelEnvironment`]
#[derive(Debug)]
pub struct EnvironmentReceivers {
    /// Messages to broadcast
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    /// Finality notifications
    pub notifications: mpsc::UnboundedReceiver<FinalityNotification>,
    /// Detected equivocations
    pub equivocations: mpsc::UnboundedReceiver<Equivocation>,
}

impl ChannelEnvironment {
    /// Create the environment together with its receivers
    pub fn new() -> (Self, EnvironmentReceivers) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        let (equivocations, equivocations_rx) = mpsc::unbounded_channel();
        (
            Self { outbound, notifications, equivocations },
            EnvironmentReceivers {
                outbound: outbound_rx,
                notifications: notifications_rx,
                equivocations: equivocations_rx,
            },
        )
    }
}

impl Environment for ChannelEnvironment {
    fn finalized(&self, finalized: &FinalizedBlocks, justification: &Justification) {
        let notification = FinalityNotification {
            finalized: finalized.clone(),
            justification: justification.clone(),
        };
        if self.notifications.send(notification).is_err() {
            trace!(target: "kestrel::service", "Finality notification receiver dropped");
        }
    }

    fn broadcast(&self, message: OutboundMessage) {
        if self.outbound.send(message).is_err() {
            trace!(target: "kestrel::service", "Outbound message receiver dropped");
        }
    }

    fn report_equivocation(&self, equivocation: &Equivocation) {
        if self.equivocations.send(equivocation.clone()).is_err() {
            trace!(target: "kestrel::service", "Equivocation receiver dropped");
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    outbound: Vec<OutboundMessage>,
    finalized: Vec<FinalityNotification>,
    equivocations: Vec<Equivocation>,
}

/// [`Environment`] keeping everything in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingEnvironment {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingEnvironment {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages broadcast so far
    pub fn outbound(&self) -> Vec<OutboundMessage> {
        self.inner.lock().outbound.clone()
    }

    /// Finality notifications so far
    pub fn finalized_blocks(&self) -> Vec<FinalityNotification> {
        self.inner.lock().finalized.clone()
    }

    /// Equivocations reported so far
    pub fn equivocations(&self) -> Vec<Equivocation> {
        self.inner.lock().equivocations.clone()
    }
}

impl Environment for RecordingEnvironment {
    fn finalized(&self, finalized: &FinalizedBlocks, justification: &Justification) {
        self.inner.lock().finalized.push(FinalityNotification {
            finalized: finalized.clone(),
            justification: justification.clone(),
        });
    }

    fn broadcast(&self, message: OutboundMessage) {
        self.inner.lock().outbound.push(message);
    }

    fn report_equivocation(&self, equivocation: &Equivocation) {
        self.inner.lock().equivocations.push(equivocation.clone());
    }
}
