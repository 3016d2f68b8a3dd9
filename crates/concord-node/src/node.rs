//! Concord Node - the application entry point.
//!
//! Architecture:
//! - Single process, flat-file record store under the data directory
//! - HTTP API for game clients (scenario sync, votes, presence, orbits)
//! - Votes and presence are in memory and reset on restart

use crate::api::{self, AppState};
use crate::engine::ScenarioEngine;
use crate::error::{Error, Result};
use crate::storage::FileStore;
use axum::Router;
use concord_vote::{PresenceTracker, VoteCoordinator, DEFAULT_TTL_SECS};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default cap on request bodies (32 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Configuration for a Concord node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for records
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Seconds a presence heartbeat counts as online
    pub presence_ttl_secs: f64,

    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./concord-data"),
            api_addr: SocketAddr::from(([0, 0, 0, 0], 5011)),
            presence_ttl_secs: DEFAULT_TTL_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Read `name` from the environment, or `default` when unset.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid {}: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            data_dir: env_or("CONCORD_DATA_DIR", defaults.data_dir)?,
            api_addr: env_or("CONCORD_API_ADDR", defaults.api_addr)?,
            presence_ttl_secs: env_or("CONCORD_PRESENCE_TTL_SECS", defaults.presence_ttl_secs)?,
            max_body_bytes: env_or("CONCORD_MAX_BODY_BYTES", defaults.max_body_bytes)?,
        };
        if !(config.presence_ttl_secs.is_finite() && config.presence_ttl_secs > 0.0) {
            return Err(Error::Config(format!(
                "Invalid CONCORD_PRESENCE_TTL_SECS: {}",
                config.presence_ttl_secs
            )));
        }
        Ok(config)
    }
}

/// A Concord node instance.
pub struct ConcordNode {
    state: Arc<AppState>,
    config: NodeConfig,
}

impl ConcordNode {
    /// Create a node, opening its record store.
    pub fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = FileStore::open(&config.data_dir)?;
        let presence = Arc::new(PresenceTracker::new(config.presence_ttl_secs));

        let state = Arc::new(AppState {
            engine: ScenarioEngine::new(Arc::new(store)),
            votes: VoteCoordinator::new(Arc::clone(&presence)),
            presence,
        });

        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// The HTTP router for this node.
    pub fn router(&self) -> Router {
        api::build_router(self.state(), self.config.max_body_bytes)
    }

    /// Run the node until the HTTP server stops.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Concord node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
