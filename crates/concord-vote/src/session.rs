//! A single vote session and its state machine.
//!
//! ```text
//! Open ──(distinct ballots >= quorum)──▶ Closed { approved: yes > no }
//!   │
//!   └──(requester cancels)────────────▶ Closed { approved: false }
//! ```
//!
//! Closed is terminal. Only `start` on the coordinator replaces a session.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::quorum::meets_quorum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed { approved: bool },
}

/// Ballot counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.yes + self.no
    }

    /// Strict majority of yes. A tie rejects.
    pub fn approves(&self) -> bool {
        self.yes > self.no
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteSession {
    pub title: String,
    pub requester: String,
    pub cost: f64,
    /// Unix seconds when the session opened.
    pub opened: u64,
    pub quorum: usize,
    ballots: BTreeMap<String, bool>,
    state: SessionState,
}

impl VoteSession {
    pub fn new(title: &str, requester: &str, cost: f64, quorum: usize, opened: u64) -> Self {
        Self {
            title: title.to_string(),
            requester: requester.to_string(),
            cost,
            opened,
            quorum,
            ballots: BTreeMap::new(),
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn tally(&self) -> Tally {
        let yes = self.ballots.values().filter(|v| **v).count();
        Tally {
            yes,
            no: self.ballots.len() - yes,
        }
    }

    /// Record or overwrite `user`'s ballot.
    ///
    /// Returns the decision if this ballot closed the session. Ballots on a
    /// closed session are ignored and return `None`.
    pub fn record(&mut self, user: &str, vote: bool) -> Option<bool> {
        if !self.is_open() {
            return None;
        }
        self.ballots.insert(user.to_string(), vote);

        let tally = self.tally();
        if meets_quorum(tally.total(), self.quorum) {
            let approved = tally.approves();
            self.state = SessionState::Closed { approved };
            return Some(approved);
        }
        None
    }

    /// Close as rejected if `user` is the requester and the session is open.
    pub fn cancel(&mut self, user: &str) -> bool {
        if !self.is_open() || user != self.requester {
            return false;
        }
        self.state = SessionState::Closed { approved: false };
        true
    }
}
