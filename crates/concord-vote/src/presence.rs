//! Player presence from client heartbeats.
//!
//! Clients post a heartbeat every few seconds carrying their wall-clock epoch.
//! A player is online while that epoch is younger than the TTL. Presence is
//! process-wide, not per save.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Seconds a heartbeat keeps a player online.
pub const DEFAULT_TTL_SECS: f64 = 30.0;

/// Source of the online player count.
pub trait Presence: Send + Sync {
    fn online_count(&self) -> usize;
}

impl<T: Presence + ?Sized> Presence for Arc<T> {
    fn online_count(&self) -> usize {
        (**self).online_count()
    }
}

/// Current wall-clock time as fractional Unix seconds.
pub fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Last heartbeat of one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceRecord {
    pub scene: String,
    /// Client wall clock at heartbeat time, Unix seconds.
    pub ut_epoch: f64,
    /// In-game universal time.
    pub ksp_ut: f64,
    pub color: String,
    /// Server wall clock when the heartbeat arrived.
    pub updated: f64,
}

/// A record as listed, with its owner and online flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceEntry {
    pub user: String,
    #[serde(flatten)]
    pub record: PresenceRecord,
    pub online: bool,
}

impl fmt::Display for PresenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user={},scene={},ut={},ksp_ut={},color={},online={}",
            self.user,
            self.record.scene,
            self.record.ut_epoch,
            self.record.ksp_ut,
            self.record.color,
            u8::from(self.online)
        )
    }
}

/// Plain-text listing, one entry per line.
pub fn render_presence(entries: &[PresenceEntry]) -> String {
    entries.iter().map(|e| format!("{}\n", e)).collect()
}

/// Heartbeat body. Every field is optional and loosely typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Heartbeat {
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub ut: Option<Value>,
    #[serde(default)]
    pub ut_epoch: Option<Value>,
    #[serde(default)]
    pub ksp_ut: Option<Value>,
}

impl Heartbeat {
    /// Parse a JSON body. Anything unparsable is an empty heartbeat.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Build the stored record. A missing or unparsable epoch becomes `now`.
    pub fn into_record(self, now: f64) -> PresenceRecord {
        let scene = self
            .scene
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let ut_epoch = self
            .ut
            .as_ref()
            .and_then(number)
            .or_else(|| self.ut_epoch.as_ref().and_then(number))
            .unwrap_or(now);

        PresenceRecord {
            scene,
            ut_epoch,
            ksp_ut: self.ksp_ut.as_ref().and_then(number).unwrap_or(0.0),
            color: self.color.map(|c| c.trim().to_string()).unwrap_or_default(),
            updated: now,
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// In-memory presence store.
#[derive(Debug)]
pub struct PresenceTracker {
    ttl: f64,
    // Expired users are kept and listed as offline until removed.
    users: RwLock<HashMap<String, PresenceRecord>>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

impl PresenceTracker {
    pub fn new(ttl_secs: f64) -> Self {
        Self {
            ttl: ttl_secs,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn heartbeat(&self, user: &str, record: PresenceRecord) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.to_string(), record);
    }

    pub fn get(&self, user: &str, now: f64) -> Option<PresenceEntry> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(user).map(|record| self.entry(user, record, now))
    }

    /// Every known player, most recent heartbeat first.
    pub fn list(&self, now: f64) -> Vec<PresenceEntry> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = users
            .iter()
            .map(|(user, record)| self.entry(user, record, now))
            .collect();
        entries.sort_by(|a, b| {
            b.record
                .ut_epoch
                .total_cmp(&a.record.ut_epoch)
                .then_with(|| a.user.cmp(&b.user))
        });
        entries
    }

    pub fn remove(&self, user: &str) -> bool {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user)
            .is_some()
    }

    pub fn online_count_at(&self, now: f64) -> usize {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.values().filter(|r| self.is_online(r, now)).count()
    }

    fn is_online(&self, record: &PresenceRecord, now: f64) -> bool {
        now - record.ut_epoch < self.ttl
    }

    fn entry(&self, user: &str, record: &PresenceRecord, now: f64) -> PresenceEntry {
        PresenceEntry {
            user: user.to_string(),
            record: record.clone(),
            online: self.is_online(record, now),
        }
    }
}

impl Presence for PresenceTracker {
    fn online_count(&self) -> usize {
        self.online_count_at(epoch_now())
    }
}
