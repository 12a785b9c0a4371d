//! Runtime configuration loaded from `hydra.toml`.
//!
//! The file is optional; every field has a default. The one policy a
//! deployment must be able to pin explicitly is the proposal-execution
//! threshold.

use crate::core::error::HydraError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "hydra.toml";

/// Threshold policy applied by `executeProposal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuorumRule {
    /// for_votes must exceed against_votes over cast votes; a failing
    /// tally marks the proposal Rejected.
    #[default]
    SimpleMajority,
    /// Any member may execute regardless of tally.
    Permissive,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GovernanceConfig {
    pub quorum: QuorumRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HydraConfig {
    pub governance: GovernanceConfig,
}

impl HydraConfig {
    /// Load `hydra.toml` from the project root; absent file = defaults.
    pub fn load(project_root: &Path) -> Result<Self, HydraError> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(HydraError::IoError)?;
        toml::from_str(&content).map_err(|e| HydraError::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quorum_is_simple_majority() {
        let config = HydraConfig::default();
        assert_eq!(config.governance.quorum, QuorumRule::SimpleMajority);
    }

    #[test]
    fn test_parse_permissive() {
        let config: HydraConfig =
            toml::from_str("[governance]\nquorum = \"permissive\"\n").unwrap();
        assert_eq!(config.governance.quorum, QuorumRule::Permissive);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: HydraConfig = toml::from_str("").unwrap();
        assert_eq!(config.governance.quorum, QuorumRule::SimpleMajority);
    }
}
