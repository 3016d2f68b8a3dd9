//! Concord Node binary
//!
//! Shared scenario sync server for multiplayer career saves.

use concord_node::{ConcordNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concord_node=info,concord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Concord Node");

    let config = NodeConfig::from_env()?;

    let node = ConcordNode::new(config)?;
    node.run().await?;

    Ok(())
}
