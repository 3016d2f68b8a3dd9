//! Ballots needed to close a vote.

/// Quorum when at most one player is online.
pub const SOLO_QUORUM: usize = 1;

/// Quorum once two or more players are online.
pub const GROUP_QUORUM: usize = 2;

/// Ballots needed to close a vote opened while `online` players are online.
///
/// ```
/// use concord_vote::quorum_for;
///
/// assert_eq!(quorum_for(0), 1);
/// assert_eq!(quorum_for(1), 1);
/// assert_eq!(quorum_for(8), 2);
/// ```
pub const fn quorum_for(online: usize) -> usize {
    if online <= 1 {
        SOLO_QUORUM
    } else {
        GROUP_QUORUM
    }
}

/// Whether `ballots` distinct voters meet `quorum`.
pub const fn meets_quorum(ballots: usize, quorum: usize) -> bool {
    ballots >= quorum
}
