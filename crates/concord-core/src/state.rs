//! # state
//!
//! why: hold the identity quartet every node advertises to its peers
//! relations: snapshotted into message.rs at send time, recorded per peer by
//! node.rs
//! what: State record, leader/candidate predicates, derived Role tag

use serde::{Deserialize, Serialize};

/// What a node claims about itself: who it is, which term it is in, who it
/// voted for and who it believes leads. Zero means "none" everywhere.
///
/// Messages embed a by-value snapshot of the sender's `State`; that snapshot
/// is the only way peers learn each other's term, vote and leader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// this node's identifier, nonzero for any live node
    pub id: i64,
    /// current election term, never decreases
    pub term: i64,
    /// id this node voted for in `term`, 0 if it has not voted
    pub vote: i64,
    /// id this node believes is leader for `term`, 0 if unknown
    pub lead: i64,
}

impl State {
    pub fn is_leader(&self) -> bool {
        self.lead == self.id
    }

    pub fn is_candidate(&self) -> bool {
        !self.is_leader() && self.vote == self.id
    }

    /// Collapse the predicates into a single tag.
    ///
    /// `is_leader` and `is_candidate` are mutually exclusive by definition;
    /// dispatching on the tag keeps that fact out of every caller.
    pub fn role(&self) -> Role {
        if self.is_leader() {
            Role::Leader
        } else if self.is_candidate() {
            Role::Candidate
        } else {
            Role::Follower
        }
    }
}

/// The three roles a consensus participant can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// passive: records peer state, waits for the host to start a campaign
    Follower,
    /// voted for self in the current term, collecting grants
    Candidate,
    /// won the current term, replicates entries to stragglers
    Leader,
}
