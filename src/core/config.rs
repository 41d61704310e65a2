//! Configuration parsing and validation.
//!
//! Node configuration is loaded from TOML files with CLI overrides. Every
//! section is optional; an empty file yields a valid single-node setup.

use crate::kv::leader::ReadConsistency;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node identity.
    #[serde(default)]
    pub node: NodeConfig,

    /// Commit stream and leader wait settings.
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Read defaults.
    #[serde(default)]
    pub reads: ReadsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Node identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identifier published as leader by the single-node engine.
    #[serde(default = "default_node_id")]
    pub node_id: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
        }
    }
}

/// Commit stream and leader wait settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Capacity of the bounded commit channel feeding the apply loop.
    #[serde(default = "default_commit_queue_depth")]
    pub commit_queue_depth: usize,

    /// How long consistent operations wait for a leader, in milliseconds.
    #[serde(default = "default_leader_wait_timeout_ms")]
    pub leader_wait_timeout_ms: u64,
}

impl ReplicationConfig {
    /// Leader wait as a duration.
    pub fn leader_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.leader_wait_timeout_ms)
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            commit_queue_depth: default_commit_queue_depth(),
            leader_wait_timeout_ms: default_leader_wait_timeout_ms(),
        }
    }
}

/// Read defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadsConfig {
    /// Consistency used when a request does not ask for one.
    #[serde(default)]
    pub default_consistency: ReadConsistency,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_node_id() -> String {
    "local".to_string()
}

fn default_commit_queue_depth() -> usize {
    1024
}

fn default_leader_wait_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref node_id) = overrides.node_id {
            self.node.node_id = node_id.clone();
        }
        if let Some(consistency) = overrides.default_consistency {
            self.reads.default_consistency = consistency;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_node()?;
        self.validate_replication()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_node(&self) -> Result<()> {
        if self.node.node_id.trim().is_empty() {
            anyhow::bail!("node.node_id must not be empty");
        }
        Ok(())
    }

    fn validate_replication(&self) -> Result<()> {
        if self.replication.commit_queue_depth == 0 {
            anyhow::bail!("replication.commit_queue_depth must be > 0");
        }
        if self.replication.leader_wait_timeout_ms == 0 {
            anyhow::bail!("replication.leader_wait_timeout_ms must be > 0");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override node identifier.
    pub node_id: Option<String>,
    /// Override default read consistency.
    pub default_consistency: Option<ReadConsistency>,
}
