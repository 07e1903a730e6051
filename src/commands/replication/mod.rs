//! Commands spoken on replication links: the replica handshake, acknowledgments and
//! WAIT.

mod psync;
mod replconf;
mod wait;

pub use psync::Psync;
pub use replconf::{Replconf, ReplconfAck, ReplconfGetAck};
pub use wait::Wait;
