//! Drives a finality service through a scenario.

use crate::scenario::{ReplayEvent, Scenario};
use eyre::WrapErr;
use kestrel_blocktree::BlockTree;
use kestrel_finality::{
    spawn_finality_service, FinalityConfig, FinalityError, FinalityHandle, FinalitySnapshot,
    RecordingEnvironment,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReplayReport {
    /// Final service state
    pub(crate) state: FinalitySnapshot,
    /// Events the gadget accepted
    pub(crate) accepted: usize,
    /// Events the gadget rejected
    pub(crate) rejected: usize,
    /// Number of root moves
    pub(crate) finalizations: usize,
    /// Number of equivocations reported
    pub(crate) equivocations: usize,
    /// Number of messages the gadget broadcast
    pub(crate) broadcasts: usize,
}

/// Replay every event of `scenario` in order. Rejected events are logged and skipped.
pub(crate) async fn replay(
    scenario: Scenario,
    config: &FinalityConfig,
) -> eyre::Result<ReplayReport> {
    let tree = BlockTree::new(
        scenario.root,
        scenario.epoch_number,
        scenario.epoch_digest,
        scenario.next_epoch_digest,
        None,
    );
    let env = RecordingEnvironment::new();
    let (handle, service) = spawn_finality_service(tree, env.clone(), config)
        .wrap_err("failed to start finality service")?;
    let task = tokio::spawn(service);

    let mut accepted = 0;
    let mut rejected = 0;
    for (index, event) in scenario.events.into_iter().enumerate() {
        match apply(&handle, event).await {
            Ok(()) => accepted += 1,
            Err(FinalityError::ServiceStopped) => eyre::bail!("finality service stopped"),
            Err(err) => {
                warn!(target: "kestrel::replay", index, %err, "Event rejected");
                rejected += 1;
            }
        }
    }

    let state = handle.state().await?;
    drop(handle);
    task.await.wrap_err("finality service panicked")?;

    Ok(ReplayReport {
        state,
        accepted,
        rejected,
        finalizations: env.finalized_blocks().len(),
        equivocations: env.equivocations().len(),
        broadcasts: env.outbound().len(),
    })
}

async fn apply(handle: &FinalityHandle, event: ReplayEvent) -> Result<(), FinalityError> {
    match event {
        ReplayEvent::Import(block) => handle.import_block(block).await,
        ReplayEvent::Remove { hash } => {
            let removed = handle.remove_block(hash).await?;
            debug!(target: "kestrel::replay", %hash, removed = removed.len(), "Removed blocks");
            Ok(())
        }
        ReplayEvent::Prevote { round, vote } => handle.prevote(round, vote).await.map(drop),
        ReplayEvent::Precommit { round, vote } => handle.precommit(round, vote).await.map(drop),
        ReplayEvent::Justification(justification) => handle.justification(justification).await,
        ReplayEvent::Advance => handle.advance_round().await.map(drop),
    }
}
