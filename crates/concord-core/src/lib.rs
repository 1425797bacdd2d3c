//! # concord-core
//!
//! why: implement the deterministic state machine that elects a leader among
//! a static peer set by exchanging messages
//! relations: driven by the host process (timers, transport), persisted via
//! concord-storage
//! what: State record, replicated Log, Message schema, Node with
//! campaign/step/read_outbox

pub mod error;
pub mod log;
pub mod message;
pub mod node;
pub mod state;

pub use error::CoreError;
pub use log::{Entry, Log, Mark};
pub use message::Message;
pub use node::Node;
pub use state::{Role, State};
