//! # node
//!
//! why: advance the consensus state machine one host stimulus at a time
//! relations: owns state.rs and log.rs, fills the outbox with message.rs
//! values for the host transport to drain
//! what: Node construction, campaign, role-dispatched step, outbox draining

use std::collections::HashMap;
use std::mem;

use tracing::{debug, trace};

use crate::error::CoreError;
use crate::log::{Entry, Log};
use crate::message::Message;
use crate::state::{Role, State};

/// A single consensus participant.
///
/// The node is pure and synchronous: it performs no I/O, keeps no clock and
/// spawns nothing. The host calls [`Node::campaign`] when an election should
/// begin and [`Node::step`] for each inbound message, then drains
/// [`Node::read_outbox`] and transmits. Concurrent calls on one node are
/// undefined; distinct nodes share nothing.
#[derive(Debug)]
pub struct Node {
    /// this node's own identity quartet
    state: State,
    /// last State record observed from each peer, keyed by id; never holds
    /// an entry for self
    peers: HashMap<i64, State>,
    /// the replicated log
    log: Log,
    /// messages waiting for the host to drain and transmit
    outbox: Vec<Message>,
}

impl Node {
    /// Create a fresh node from an explicit peer list.
    ///
    /// Ids equal to self or zero are skipped. With at least one peer, a
    /// bootstrap entry carrying the full sorted cluster list is placed at
    /// index 1 so lagging peers learn membership through log catch-up.
    pub fn new(id: i64, peer_ids: &[i64]) -> Result<Self, CoreError> {
        if id == 0 {
            return Err(CoreError::InvalidId);
        }

        let peers: HashMap<i64, State> = peer_ids
            .iter()
            .copied()
            .filter(|&p| p != id && p != 0)
            .map(|p| (p, State::default()))
            .collect();

        let log = if peers.is_empty() {
            Log::new()
        } else {
            let mut cluster: Vec<i64> = peers.keys().copied().chain([id]).collect();
            cluster.sort_unstable();
            Log::from_entries(vec![
                Entry::default(),
                Entry { index: 1, term: 0, peers: Some(cluster), data: Vec::new() },
            ])?
        };

        Ok(Self {
            state: State { id, ..State::default() },
            peers,
            log,
            outbox: Vec::new(),
        })
    }

    /// Adopt a bootstrap log, deriving the peer set from the entry that
    /// carries one.
    ///
    /// The sequence must satisfy the log invariants (sentinel at 0,
    /// contiguous indices); a `peers` list may appear only on the bootstrap
    /// entry at index 1 and may not contain zero ids.
    pub fn from_entries(id: i64, entries: Vec<Entry>) -> Result<Self, CoreError> {
        if id == 0 {
            return Err(CoreError::InvalidId);
        }
        let log = Log::from_entries(entries)?;

        let mut peers = HashMap::new();
        for entry in log.tail() {
            let Some(cluster) = &entry.peers else {
                continue;
            };
            if entry.index != 1 {
                return Err(CoreError::malformed(format!(
                    "peer list on entry {}, only the bootstrap entry at index 1 may carry one",
                    entry.index
                )));
            }
            for &p in cluster {
                if p == 0 {
                    return Err(CoreError::malformed("peer id cannot be zero"));
                }
                if p != id {
                    peers.insert(p, State::default());
                }
            }
        }

        Ok(Self {
            state: State { id, ..State::default() },
            peers,
            log,
            outbox: Vec::new(),
        })
    }

    pub fn id(&self) -> i64 {
        self.state.id
    }

    /// snapshot of this node's own State record
    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }

    pub fn is_candidate(&self) -> bool {
        self.state.is_candidate()
    }

    /// read-only view of the replicated log
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// sorted ids of every peer this node tracks, self excluded
    pub fn peer_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.peers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Begin an election: advance the term, vote for self and solicit the
    /// peers.
    ///
    /// With no peers the node is a quorum of one and self-elects without
    /// producing traffic.
    pub fn campaign(&mut self) {
        self.state.term += 1;
        self.state.vote = self.state.id;
        self.state.lead = 0;

        if self.peers.is_empty() {
            self.state.lead = self.state.id;
            debug!(id = self.state.id, term = self.state.term, "self-elected, no peers");
            return;
        }

        debug!(id = self.state.id, term = self.state.term, "campaigning");
        let mark = self.log.head_mark();
        for to in self.peer_ids() {
            self.send(Message { to, mark, ..Message::default() });
        }
    }

    /// Consume one inbound message.
    ///
    /// Traffic from ids outside the peer table is dropped without touching
    /// any state; the network may replay, reorder or misdeliver and the
    /// core must stay standing. Everything else records the sender's State
    /// snapshot before role dispatch, so duplicate grants collapse onto one
    /// peer-table slot.
    pub fn step(&mut self, m: Message) {
        if !self.peers.contains_key(&m.from.id) {
            trace!(id = self.state.id, from = m.from.id, "dropping message from unknown peer");
            return;
        }

        // a peer ahead of us in terms wins: adopt the term and revert to
        // follower before dispatching
        if m.from.term > self.state.term {
            debug!(
                id = self.state.id,
                from = m.from.id,
                term = m.from.term,
                "observed higher term, stepping down"
            );
            self.state.term = m.from.term;
            self.state.vote = 0;
            self.state.lead = 0;
        }

        self.peers.insert(m.from.id, m.from);

        match self.state.role() {
            Role::Leader => {
                // only a message acknowledging our leadership is an append
                // response
                if m.from.lead == self.state.id {
                    self.handle_append_response(&m);
                }
            }
            Role::Candidate => {
                if m.from.vote == self.state.id && m.from.term == self.state.term {
                    self.handle_vote_grant();
                }
            }
            Role::Follower => {
                // record-only: vote responses and append application are
                // driven by the follower-side collaborator
            }
        }
    }

    /// Take every pending outbound message, leaving the outbox empty.
    ///
    /// Each message carries the State snapshot taken when it was enqueued,
    /// not the state at drain time.
    pub fn read_outbox(&mut self) -> Vec<Message> {
        mem::take(&mut self.outbox)
    }

    fn handle_vote_grant(&mut self) {
        if self.has_majority() {
            self.become_leader();
        }
    }

    /// Count grants recorded for the current term. Self voted for itself in
    /// `campaign` and is not in the peer table, so `k / 2` grants among the
    /// `k` peers complete a majority.
    fn has_majority(&self) -> bool {
        let grants = self
            .peers
            .values()
            .filter(|s| s.term == self.state.term && s.vote == self.state.id)
            .count();
        grants >= self.peers.len() / 2
    }

    fn become_leader(&mut self) {
        self.state.lead = self.state.id;
        debug!(id = self.state.id, term = self.state.term, "won election");

        // append a no-op so every follower advances into the new term
        // without waiting for client traffic
        let prev = self.log.head_mark();
        let noop = self.log.append(Vec::new(), self.state.term);
        for to in self.peer_ids() {
            self.send(Message {
                to,
                mark: prev,
                entries: vec![noop.clone()],
                ..Message::default()
            });
        }
    }

    /// A follower acknowledged us at `m.mark`; if it trails our head,
    /// resend everything after the position it reported.
    fn handle_append_response(&mut self, m: &Message) {
        let head = self.log.head_mark();
        if m.mark.index >= head.index {
            return;
        }
        let Some(at) = self.log.at(m.mark.index) else {
            trace!(
                id = self.state.id,
                from = m.from.id,
                index = m.mark.index,
                "ignoring append response with out-of-range mark"
            );
            return;
        };
        let mark = at.mark();
        let entries = self.log.suffix_from(m.mark.index).to_vec();
        self.send(Message { to: m.from.id, mark, entries, ..Message::default() });
    }

    /// Queue a message, stamping it with the current State snapshot.
    /// Messages addressed to self never reach the outbox.
    fn send(&mut self, mut m: Message) {
        if m.to == self.state.id {
            trace!(id = self.state.id, "dropping self-addressed message");
            return;
        }
        m.from = self.state;
        self.outbox.push(m);
    }
}
