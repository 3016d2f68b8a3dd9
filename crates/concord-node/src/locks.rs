//! Per-record async locks.
//!
//! Every read-merge-write of a (save, module) record holds that key's lock.
//! Callers that need two keys take them in [`concord_merge::Module::ALL`]
//! order. Saves are keyed by their sanitized name, the same name the
//! record store writes under.

use crate::storage::sanitize_segment;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to (save, module).
    pub async fn lock(&self, save: &str, module: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry((sanitize_segment(save), module.to_string()))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyLocks::new();
        let guard = locks.lock("s", "TechTree").await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock("s", "TechTree")).await;
        assert!(blocked.is_err());

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock("s", "TechTree")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn aliased_saves_share_a_lock() {
        let locks = KeyLocks::new();
        let _guard = locks.lock("my save", "SciencePoints").await;
        for alias in ["mysave", "my!save", " mysave "] {
            let blocked =
                tokio::time::timeout(Duration::from_millis(50), locks.lock(alias, "SciencePoints")).await;
            assert!(blocked.is_err(), "{alias} was not excluded");
        }

        let _dots = locks.lock("..", "TechTree").await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock(".", "TechTree")).await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _tech = locks.lock("s", "TechTree").await;
        let points = tokio::time::timeout(Duration::from_millis(50), locks.lock("s", "SciencePoints")).await;
        let other_save = tokio::time::timeout(Duration::from_millis(50), locks.lock("t", "TechTree")).await;
        assert!(points.is_ok());
        assert!(other_save.is_ok());
    }
}
