//! # error
//!
//! why: give construction failures a typed surface instead of panics
//! relations: returned by node.rs and log.rs constructors
//! what: CoreError enum

use thiserror::Error;

/// Errors surfaced when constructing a node or adopting an external log.
///
/// Runtime anomalies (unknown peers, stale terms, duplicate grants) are not
/// errors; `Node::step` absorbs them silently.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// zero is reserved as "none" and cannot identify a live node
    #[error("node id cannot be zero")]
    InvalidId,

    /// the supplied entry sequence violates a log invariant
    #[error("malformed log: {reason}")]
    MalformedLog { reason: String },
}

impl CoreError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CoreError::MalformedLog { reason: reason.into() }
    }
}
