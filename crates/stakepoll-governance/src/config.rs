//! Engine configuration.

use serde::{Deserialize, Serialize};
use stakepoll_types::Amount;

use crate::error::{GovernanceError, Result};

/// Ceiling on a poll's per-option vote limit.
pub const DEFAULT_VOTE_LIMIT_CEILING: Amount = 35_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Polls may not be created with a vote limit above this value.
    pub vote_limit_ceiling: Amount,
    /// Treat a tally underflow as a fatal `ConsistencyViolation` instead of
    /// clamping it at zero.
    pub strict_consistency: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            vote_limit_ceiling: DEFAULT_VOTE_LIMIT_CEILING,
            strict_consistency: true,
        }
    }
}

impl GovernanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vote_limit_ceiling == 0 {
            return Err(GovernanceError::InvalidParameter(
                "vote_limit_ceiling must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
