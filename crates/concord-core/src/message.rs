//! # message
//!
//! why: define the single unit of exchange between peers
//! relations: built by node.rs into the outbox, encoded by the host codec
//! what: Message carrying a sender State snapshot, a log mark and entries

use serde::{Deserialize, Serialize};

use crate::log::{Entry, Mark};
use crate::state::State;

/// One unit of peer traffic.
///
/// There is no request/response taxonomy on the wire: every message carries
/// the sender's full `State` snapshot, and recipients classify traffic by
/// comparing that snapshot against their own state. A vote request is a
/// message whose mark is the sender's log head; an append request is one
/// whose mark names the predecessor the recipient must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// the sender's State record as of the moment the message was enqueued,
    /// never a live reference
    pub from: State,
    /// recipient id
    pub to: i64,
    /// log position this message refers to
    pub mark: Mark,
    /// entries for the recipient to append, empty on vote requests
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// set when the sender knows the recipient was removed from membership;
    /// reserved for the membership subsystem, the core does not act on it
    #[serde(default)]
    pub quit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_encoding_decodes_with_defaults() {
        let raw = r#"{
            "from": {"id": 2, "term": 1, "vote": 1, "lead": 0},
            "to": 1,
            "mark": {"index": 0, "term": 0}
        }"#;
        let m: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(m.from.id, 2);
        assert_eq!(m.to, 1);
        assert!(m.entries.is_empty());
        assert!(!m.quit);
    }

    #[test]
    fn round_trips_entries_and_peer_lists() {
        let m = Message {
            from: State { id: 1, term: 2, vote: 1, lead: 1 },
            to: 3,
            mark: Mark { index: 1, term: 0 },
            entries: vec![Entry {
                index: 2,
                term: 2,
                peers: Some(vec![1, 2, 3]),
                data: b"put a 1".to_vec(),
            }],
            quit: false,
        };
        let encoded = serde_json::to_string(&m).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, m);
    }
}
