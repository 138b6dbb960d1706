//! QUORANET Node Binary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quoranet_core::NodeConfig;
use quoranet_crypto::{KeyPair, KeyType};
use quoranet_node::{GenesisBlockStore, NodeBuilder, SentryEngine};
use quoranet_p2p::{host_keypair, spawn_libp2p, PeerList};

#[derive(Parser)]
#[command(name = "quoranet-node")]
#[command(about = "QUORANET Node - block gossip for a permissioned chain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a relay (sentry) node
    Run {
        /// P2P listen address
        #[arg(long, default_value = "/ip4/0.0.0.0/tcp/30777")]
        p2p_addr: String,

        /// Bootstrap peer multiaddrs
        #[arg(long)]
        bootstrap: Vec<String>,

        /// Data directory
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Disable mDNS local discovery
        #[arg(long)]
        no_mdns: bool,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Key scheme: secp256k1 or ed25519
        #[arg(long, default_value = "ed25519")]
        key_type: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            p2p_addr,
            bootstrap,
            data_dir,
            no_mdns,
        } => {
            info!("starting QUORANET node");

            let keypair = load_or_create_keypair(&data_dir)?;

            let mut config = NodeConfig::default();
            config.network.listen_addr = p2p_addr;
            config.network.bootstrap_nodes = bootstrap;
            config.network.enable_mdns = !no_mdns;

            let cancel = CancellationToken::new();
            let peers = PeerList::new();
            let host = host_keypair(keypair.private_key())?;
            let (gossip, streams) =
                spawn_libp2p(host, &config.network, peers.clone(), cancel.clone()).await?;

            let node = NodeBuilder::new(Arc::new(SentryEngine), Arc::new(GenesisBlockStore))
                .config(config)
                .keypair(keypair)
                .cancel(cancel)
                .build(gossip, streams, peers);
            node.start().await?;

            info!(peer = %node.local_peer_id(), "node running, ctrl-c to stop");
            tokio::signal::ctrl_c().await?;

            info!("shutdown signal received, stopping node");
            node.shutdown().await;
        }

        Commands::Keygen { output, key_type } => {
            let key_type: KeyType = key_type.parse()?;
            let keypair = KeyPair::generate(key_type);
            let json = keypair_json(&keypair)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    println!("keypair saved to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn keypair_json(keypair: &KeyPair) -> anyhow::Result<String> {
    let info = serde_json::json!({
        "key_type": keypair.key_type().to_string(),
        "public_key": keypair.public_key().to_hex(),
        "secret_key": hex::encode(&*keypair.private_key().to_bytes()),
    });
    Ok(serde_json::to_string_pretty(&info)?)
}

fn load_or_create_keypair(data_dir: &Path) -> anyhow::Result<KeyPair> {
    let key_path = data_dir.join("node_key.json");

    if key_path.exists() {
        let content = std::fs::read_to_string(&key_path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        let key_type: KeyType = value
            .get("key_type")
            .and_then(|v| v.as_str())
            .unwrap_or("ed25519")
            .parse()?;
        let secret_hex = value
            .get("secret_key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("no secret_key in {}", key_path.display()))?;
        let secret = hex::decode(secret_hex)?;

        let keypair = KeyPair::from_secret_bytes(key_type, &secret)?;
        info!("loaded keypair from {}", key_path.display());
        return Ok(keypair);
    }

    std::fs::create_dir_all(data_dir)?;
    let keypair = KeyPair::generate(KeyType::Ed25519);
    std::fs::write(&key_path, keypair_json(&keypair)?)?;
    info!("generated new keypair, saved to {}", key_path.display());

    Ok(keypair)
}
