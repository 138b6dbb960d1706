//! Network behaviour for libp2p

use std::time::Duration;

use libp2p::{
    gossipsub::{self, MessageAuthenticity, ValidationMode},
    identity::Keypair,
    mdns,
    swarm::behaviour::toggle::Toggle,
    swarm::NetworkBehaviour,
};

use quoranet_core::Hash;

/// Combined network behaviour: gossipsub for the four topics, mDNS for
/// local discovery, and per-peer streams for block-proposal pulls.
#[derive(NetworkBehaviour)]
pub struct QuoranetBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub mdns: Toggle<mdns::tokio::Behaviour>,
    pub stream: libp2p_stream::Behaviour,
}

impl QuoranetBehaviour {
    pub fn new(
        keypair: &Keypair,
        enable_mdns: bool,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // Configure gossipsub; message ids are content hashes so relayed
        // duplicates collapse.
        let gossipsub_config = gossipsub::ConfigBuilder::default()
            .heartbeat_interval(Duration::from_secs(1))
            .validation_mode(ValidationMode::Strict)
            .message_id_fn(|message| {
                gossipsub::MessageId::from(Hash::digest(&message.data).to_hex())
            })
            .build()
            .map_err(|e| format!("failed to build gossipsub config: {e}"))?;

        let gossipsub = gossipsub::Behaviour::new(
            MessageAuthenticity::Signed(keypair.clone()),
            gossipsub_config,
        )
        .map_err(|e| format!("failed to create gossipsub: {e}"))?;

        let mdns = enable_mdns
            .then(|| {
                mdns::tokio::Behaviour::new(mdns::Config::default(), keypair.public().to_peer_id())
            })
            .transpose()
            .map_err(|e| format!("failed to create mdns: {e}"))?
            .into();

        Ok(Self {
            gossipsub,
            mdns,
            stream: libp2p_stream::Behaviour::new(),
        })
    }
}
