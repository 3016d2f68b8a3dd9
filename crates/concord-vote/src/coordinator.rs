//! Vote sessions keyed by (save, tech).
//!
//! The session map lock is held only to find or replace a session. Each
//! session has its own mutex, so a ballot's record, tally and close happen
//! atomically and exactly one caller observes the closing transition.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, VoteError};
use crate::presence::Presence;
use crate::quorum::quorum_for;
use crate::session::{SessionState, VoteSession};

type VoteKey = (String, String);

/// Result of a cast that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    /// Ballot stored, session still open.
    Recorded,
    /// This ballot closed the session.
    Closed { approved: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// No session exists for the key.
    NoSession,
    /// The requester closed the session as rejected.
    Cancelled,
    /// Caller is not the requester, or the session was already closed.
    Ignored,
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteStatus {
    pub title: String,
    pub requester: String,
    pub cost: f64,
    pub yes: usize,
    pub no: usize,
    pub quorum: usize,
    pub decided: bool,
    /// `None` while the session is open.
    pub approved: Option<bool>,
}

/// An open session as listed for a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenVote {
    pub tech: String,
    pub title: String,
    pub requester: String,
}

impl fmt::Display for OpenVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.tech, self.title, self.requester)
    }
}

pub struct VoteCoordinator<P> {
    presence: P,
    // Closed sessions stay until the next `start` of the same key replaces
    // them, so `status` keeps reporting the decision.
    sessions: Mutex<HashMap<VoteKey, Arc<Mutex<VoteSession>>>>,
}

impl<P: Presence> VoteCoordinator<P> {
    pub fn new(presence: P) -> Self {
        Self {
            presence,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn presence(&self) -> &P {
        &self.presence
    }

    /// Open a vote, replacing any previous session for the same tech.
    ///
    /// Returns the quorum fixed for this session.
    pub fn start(&self, save: &str, tech: &str, requester: &str, title: &str, cost: f64) -> usize {
        let online = self.presence.online_count();
        let quorum = quorum_for(online);
        let session = VoteSession::new(title, requester, cost, quorum, unix_now());

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(save, tech), Arc::new(Mutex::new(session)));

        info!(save, tech, requester, online, quorum, "Vote opened");
        quorum
    }

    /// Record `user`'s ballot.
    pub fn cast(&self, save: &str, tech: &str, user: &str, vote: bool) -> Result<CastOutcome> {
        let no_vote = || VoteError::NoOpenVote {
            save: save.to_string(),
            tech: tech.to_string(),
        };
        let session = self.session(save, tech).ok_or_else(no_vote)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        if !session.is_open() {
            return Err(no_vote());
        }

        match session.record(user, vote) {
            Some(approved) => {
                let tally = session.tally();
                info!(save, tech, approved, yes = tally.yes, no = tally.no, "Vote closed");
                Ok(CastOutcome::Closed { approved })
            }
            None => {
                debug!(save, tech, user, vote, "Ballot recorded");
                Ok(CastOutcome::Recorded)
            }
        }
    }

    /// Cancel a vote. Only the requester may cancel.
    pub fn cancel(&self, save: &str, tech: &str, user: &str) -> CancelOutcome {
        let Some(session) = self.session(save, tech) else {
            return CancelOutcome::NoSession;
        };
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.cancel(user) {
            info!(save, tech, user, "Vote cancelled");
            CancelOutcome::Cancelled
        } else {
            debug!(save, tech, user, "Ignoring cancel from non-requester");
            CancelOutcome::Ignored
        }
    }

    pub fn status(&self, save: &str, tech: &str) -> Option<VoteStatus> {
        let session = self.session(save, tech)?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let tally = session.tally();
        let approved = match session.state() {
            SessionState::Open => None,
            SessionState::Closed { approved } => Some(approved),
        };
        Some(VoteStatus {
            title: session.title.clone(),
            requester: session.requester.clone(),
            cost: session.cost,
            yes: tally.yes,
            no: tally.no,
            quorum: session.quorum,
            decided: approved.is_some(),
            approved,
        })
    }

    /// Open sessions of a save, ordered by tech id.
    pub fn open_votes(&self, save: &str) -> Vec<OpenVote> {
        let sessions: Vec<_> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((s, _), _)| s == save)
            .map(|((_, tech), session)| (tech.clone(), Arc::clone(session)))
            .collect();

        let mut open: Vec<OpenVote> = sessions
            .into_iter()
            .filter_map(|(tech, session)| {
                let session = session.lock().unwrap_or_else(PoisonError::into_inner);
                session.is_open().then(|| OpenVote {
                    tech,
                    title: session.title.clone(),
                    requester: session.requester.clone(),
                })
            })
            .collect();
        open.sort_by(|a, b| a.tech.cmp(&b.tech));
        open
    }

    fn session(&self, save: &str, tech: &str) -> Option<Arc<Mutex<VoteSession>>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(save, tech))
            .cloned()
    }
}

fn key(save: &str, tech: &str) -> VoteKey {
    (save.to_string(), tech.to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
