//! Node configuration.
//!
//! Loaded from a TOML file and overridden by command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use stakepoll_governance::{GovernanceConfig, RosterAuthorizer};
use stakepoll_types::Address;

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name
    pub name: String,
    /// Engine parameters
    pub governance: GovernanceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Administrators, as addresses or member names
    pub admins: Vec<String>,
    /// Poll creators. Empty lets anyone create polls.
    pub creators: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "stakepoll-node".to_string(),
            governance: GovernanceConfig::default(),
            logging: LoggingConfig::default(),
            admins: vec!["admin".to_string()],
            creators: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file.
    /// Paths containing `..` are rejected.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        reject_traversal(path)?;

        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: NodeConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        reject_traversal(path)?;

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.governance.validate()?;

        if self.name.trim().is_empty() {
            anyhow::bail!("Node name cannot be empty");
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => anyhow::bail!("Unknown log format '{}', expected 'pretty' or 'json'", other),
        }
        if self.admins.iter().chain(&self.creators).any(|m| m.trim().is_empty()) {
            anyhow::bail!("Roster entries cannot be empty");
        }

        Ok(())
    }

    /// Build the authorizer described by `admins` and `creators`.
    pub fn authorizer(&self) -> RosterAuthorizer {
        let roster = self
            .admins
            .iter()
            .fold(RosterAuthorizer::open(), |roster, admin| {
                roster.with_admin(resolve_member(admin))
            });
        self.creators
            .iter()
            .fold(roster, |roster, creator| roster.with_creator(resolve_member(creator)))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `stakepoll_governance=debug`
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Append logs to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

/// Resolve a member reference: a `stake1…`/`0x…` address, or any other
/// string as a name whose address is derived from it.
pub fn resolve_member(reference: &str) -> Address {
    Address::from_str(reference).unwrap_or_else(|_| Address::derive(reference.as_bytes()))
}

fn reject_traversal(path: &Path) -> anyhow::Result<()> {
    if path.to_string_lossy().contains("..") {
        anyhow::bail!("Invalid path: directory traversal detected");
    }
    Ok(())
}
