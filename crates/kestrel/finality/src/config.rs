//! Finality gadget configuration

use crate::FinalityError;
use kestrel_blocktree::VoterId;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Default round timeout
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(4);

/// Default number of rounds kept in memory
pub const DEFAULT_ROUNDS_TO_KEEP: usize = 3;

/// Default command queue size of the finality service
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration of the round chain and the finality service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalityConfig {
    /// Voter identity of this node, `None` for an observer
    pub local_voter: Option<VoterId>,
    /// How long a round may run before it is advanced anyway
    #[serde(with = "humantime_serde")]
    pub round_timeout: Duration,
    /// Rounds kept behind (and including) the latest one
    pub rounds_to_keep: usize,
    /// Capacity of the service command channel
    pub channel_capacity: usize,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            local_voter: None,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            rounds_to_keep: DEFAULT_ROUNDS_TO_KEEP,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl FinalityConfig {
    /// Configure the local voter
    pub const fn with_local_voter(mut self, voter: VoterId) -> Self {
        self.local_voter = Some(voter);
        self
    }

    /// Configure the round timeout
    pub const fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = timeout;
        self
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FinalityError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FinalityError> {
        // the previous round is needed to seed the latest one
        if self.rounds_to_keep < 2 {
            return Err(FinalityError::InvalidConfig(format!(
                "rounds_to_keep must be at least 2, got {}",
                self.rounds_to_keep
            )));
        }
        if self.channel_capacity == 0 {
            return Err(FinalityError::InvalidConfig("channel_capacity must be non-zero".into()));
        }
        if self.round_timeout.is_zero() {
            return Err(FinalityError::InvalidConfig("round_timeout must be non-zero".into()));
        }
        Ok(())
    }
}
