//! Configuration types for QUORANET

use serde::{Deserialize, Serialize};

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Network configuration
    pub network: NetworkConfig,

    /// Consensus gossip configuration
    pub consensus: ConsensusConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "quoranet-node".to_string(),
            network: NetworkConfig::default(),
            consensus: ConsensusConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Listen address for P2P
    pub listen_addr: String,

    /// Bootstrap nodes
    pub bootstrap_nodes: Vec<String>,

    /// Maximum peer connections
    pub max_peers: usize,

    /// Enable mDNS for local discovery
    pub enable_mdns: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/30777".to_string(),
            bootstrap_nodes: vec![],
            max_peers: 50,
            enable_mdns: true,
        }
    }
}

/// Consensus gossip configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Timeout for one side of a block-proposal stream exchange, in
    /// milliseconds
    pub blk_send_timeout_ms: u64,

    /// Capacity of the ACK publish channel
    pub ack_channel_capacity: usize,

    /// Capacity of the discovery request/response publish channels
    pub discovery_channel_capacity: usize,

    /// Capacity of the consensus-reset publish channel
    pub reset_channel_capacity: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            blk_send_timeout_ms: 20_000,
            ack_channel_capacity: 1,
            discovery_channel_capacity: 1,
            reset_channel_capacity: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = NodeConfig::default();
        assert!(!cfg.name.is_empty());
        assert!(cfg.consensus.blk_send_timeout_ms > 0);
        assert!(cfg.consensus.ack_channel_capacity >= 1);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = NodeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.network.listen_addr, back.network.listen_addr);
        assert_eq!(
            cfg.consensus.blk_send_timeout_ms,
            back.consensus.blk_send_timeout_ms
        );
    }
}
