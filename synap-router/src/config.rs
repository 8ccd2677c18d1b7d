use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Commands buffered per node before a batch is flushed
    pub pipeline_depth: usize,

    /// Settings passed to every node connection
    pub connection: ConnectionConfig,
}

/// Per-node connection settings, opaque to the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// AUTH user, if the cluster uses ACLs
    pub username: Option<String>,

    /// AUTH password
    pub password: Option<String>,

    /// Logical database selected after connect
    pub database: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pipeline_depth: 64,
            connection: ConnectionConfig::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            read_timeout_ms: 60000,
            username: None,
            password: None,
            database: 0,
        }
    }
}

impl RouterConfig {
    /// Create config with a pipeline depth and default connection settings
    pub fn with_pipeline_depth(pipeline_depth: usize) -> Self {
        Self {
            pipeline_depth,
            ..Default::default()
        }
    }

    /// Parse config from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline_depth == 0 {
            return Err(RouterError::Config(
                "pipeline_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
