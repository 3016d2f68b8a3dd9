//! Concord Node - Shared Scenario Sync Server
//!
//! Several players run the same career save. Each game client uploads its
//! scenario modules here and downloads the converged result, so research,
//! science and scanner coverage stay in step across the group.
//!
//! # Architecture
//!
//! - **Storage**: flat-file records, one per (save, module) plus per-user snapshots
//! - **Engine**: read-merge-write per module under a per-key async lock
//! - **Votes**: quorum-gated tech unlock voting with presence-derived quorum
//! - **API**: HTTP endpoints for clients
//!
//! # Example
//!
//! ```no_run
//! use concord_node::{ConcordNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = ConcordNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod engine;
pub mod error;
pub mod locks;
pub mod node;
pub mod storage;

pub use engine::{ScenarioEngine, UploadOutcome};
pub use error::{Error, Result};
pub use node::{ConcordNode, NodeConfig};
pub use storage::{FileStore, RecordKey, RecordStore};
