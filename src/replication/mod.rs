//! Master/replica replication.
//!
//! [`ReplicationManager`] is owned by every server. On a master it tracks attached
//! replicas, broadcasts write commands to them and counts acknowledgments for WAIT.
//! On a replica it only keeps the offset of the stream received from the master.
//! [`client`] performs the replica's side of the handshake.

pub mod client;
mod manager;

pub use manager::{ReplicaInfo, ReplicationManager, DEFAULT_REPLICATION_ID};
