//! Tech Unlock Voting
//!
//! A player who wants to unlock a tech opens a vote. Every other player may
//! cast a ballot, and the session closes as soon as enough distinct players
//! have voted.
//!
//! # Quorum
//!
//! The quorum is fixed when the vote opens, from the number of players online:
//! - 0 or 1 online → 1 ballot (a solo player is never blocked)
//! - 2 or more online → 2 ballots
//!
//! The closing ballot decides: approved iff yes > no, so ties reject.
//!
//! # Presence
//!
//! Online counts come from a [`Presence`] source. [`PresenceTracker`] is the
//! heartbeat-driven implementation the node uses; tests substitute fixed
//! counts.

mod coordinator;
mod error;
mod presence;
mod quorum;
mod request;
mod session;

pub use coordinator::{CancelOutcome, CastOutcome, OpenVote, VoteCoordinator, VoteStatus};
pub use error::{Result, VoteError};
pub use presence::{
    epoch_now, render_presence, Heartbeat, Presence, PresenceEntry, PresenceRecord, PresenceTracker,
    DEFAULT_TTL_SECS,
};
pub use quorum::{quorum_for, GROUP_QUORUM, SOLO_QUORUM};
pub use request::{parse_ballot, request_user, CastRequest, StartRequest, UserRequest, DEFAULT_USER};
pub use session::{SessionState, Tally, VoteSession};

#[cfg(test)]
mod tests {
    use super::*;

    struct Online(usize);

    impl Presence for Online {
        fn online_count(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn two_player_vote_round() {
        let votes = VoteCoordinator::new(Online(2));
        votes.start("career", "advRocketry", "alice", "Advanced Rocketry", 45.0);

        assert_eq!(votes.cast("career", "advRocketry", "alice", true), Ok(CastOutcome::Recorded));
        assert_eq!(
            votes.cast("career", "advRocketry", "bob", true),
            Ok(CastOutcome::Closed { approved: true })
        );

        let status = votes.status("career", "advRocketry").unwrap();
        assert!(status.decided);
        assert_eq!(status.approved, Some(true));
        assert!(votes.open_votes("career").is_empty());
    }
}
