//! Replay scenario files

use eyre::WrapErr;
use kestrel_blocktree::{BlockInfo, EpochDigest, EpochNumber};
use kestrel_finality::{BlockImport, Justification, RoundNumber, Vote};
use serde::Deserialize;
use std::path::Path;

/// A recorded sequence of gadget inputs on top of a finalized root.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Scenario {
    /// Finalized root the tree starts from
    pub(crate) root: BlockInfo,
    /// Epoch of the root
    #[serde(default)]
    pub(crate) epoch_number: EpochNumber,
    /// Authorities of the root epoch
    pub(crate) epoch_digest: EpochDigest,
    /// Authorities scheduled by the root, if any
    #[serde(default)]
    pub(crate) next_epoch_digest: Option<EpochDigest>,
    /// Inputs in arrival order
    pub(crate) events: Vec<ReplayEvent>,
}

/// One recorded input
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ReplayEvent {
    /// Block import
    Import(BlockImport),
    /// Invalid block removal
    Remove {
        /// Removed block
        hash: kestrel_blocktree::BlockHash,
    },
    /// Network prevote
    Prevote {
        /// Round number
        round: RoundNumber,
        /// The vote
        vote: Vote,
    },
    /// Network precommit
    Precommit {
        /// Round number
        round: RoundNumber,
        /// The vote
        vote: Vote,
    },
    /// Justification from a peer
    Justification(Justification),
    /// Round timer expiry
    Advance,
}

impl Scenario {
    /// Load a scenario from a JSON file
    pub(crate) fn from_json_file(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("failed to parse scenario {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bundled_scenario() {
        let scenario: Scenario =
            serde_json::from_str(include_str!("../scenarios/fork.json")).unwrap();

        assert_eq!(scenario.root.number, 0);
        assert_eq!(scenario.epoch_digest.authorities.len(), 4);
        assert!(matches!(scenario.events.first(), Some(ReplayEvent::Import(_))));
        assert!(matches!(scenario.events.last(), Some(ReplayEvent::Advance)));
        let precommits = scenario
            .events
            .iter()
            .filter(|event| matches!(event, ReplayEvent::Precommit { .. }))
            .count();
        assert_eq!(precommits, 5);
    }
}
