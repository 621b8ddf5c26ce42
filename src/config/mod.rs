//! Configuration module for Treeline.

use crate::error::{Result, TreelineError};
use crate::types::ClusterConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Main configuration for a Treeline node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreelineConfig {
    /// Node identity.
    pub node: NodeConfig,
    /// Serving policy seeded into the store by this node in single-node
    /// deployments. Multi-node clusters distribute the policy through the
    /// store instead.
    #[serde(default)]
    pub serving: ClusterConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl TreelineConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TreelineError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| TreelineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.node.id.is_empty() {
            return Err(TreelineError::InvalidConfig {
                field: "node.id".to_string(),
                reason: "Node ID must be non-empty".to_string(),
            });
        }

        if self.serving.minimum_serving_nodes == 0 {
            return Err(TreelineError::InvalidConfig {
                field: "serving.minimum_serving_nodes".to_string(),
                reason: "Minimum serving nodes must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.serving.minimum_serving_fraction) {
            return Err(TreelineError::InvalidConfig {
                field: "serving.minimum_serving_fraction".to_string(),
                reason: "Minimum serving fraction must be within [0, 1]".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            node: NodeConfig {
                id: "dev-node".to_string(),
                hostname: "127.0.0.1".to_string(),
                log_port: 8484,
            },
            serving: ClusterConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Node-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier.
    pub id: String,
    /// Hostname clients reach this node's log frontend on.
    pub hostname: String,
    /// Port of this node's log frontend.
    pub log_port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            hostname: "localhost".to_string(),
            log_port: 8484,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics.
    pub metrics_enabled: bool,
    /// Metrics bind address.
    pub metrics_addr: SocketAddr,
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_addr: "0.0.0.0:9090".parse().expect("valid socket address"),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TreelineConfig::default().validate().is_ok());
        assert!(TreelineConfig::development().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_node_id() {
        let mut config = TreelineConfig::development();
        config.node.id.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_minimum_serving_nodes() {
        let mut config = TreelineConfig::development();
        config.serving.minimum_serving_nodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        let mut config = TreelineConfig::development();
        config.serving.minimum_serving_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("treeline-config-{}.json", uuid::Uuid::new_v4()));
        let config = TreelineConfig::development();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = TreelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.node.id, "dev-node");
        assert_eq!(loaded.node.log_port, 8484);

        std::fs::remove_file(&path).ok();
    }
}
