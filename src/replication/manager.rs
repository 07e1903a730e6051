use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use tokio::{
    sync::{mpsc::UnboundedSender, watch, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard},
    time::{timeout_at, Instant},
};
use tracing::{debug, info, warn};

use crate::{connection::ConnectionId, resp::RespValue};

pub const DEFAULT_REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

#[derive(Debug)]
struct ReplicaState {
    address: String,
    listening_port: Option<u16>,
    outbound: UnboundedSender<Bytes>,
    acknowledged_offset: u64,
    /// Master offset right after the last command sent to this replica.
    expected_offset: u64,
    acknowledged: bool,
}

impl ReplicaState {
    fn is_caught_up(&self) -> bool {
        self.acknowledged || self.acknowledged_offset >= self.expected_offset
    }

    fn is_lagging(&self) -> bool {
        !self.acknowledged && self.expected_offset > self.acknowledged_offset
    }
}

/// Snapshot of one attached replica, as reported by INFO.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaInfo {
    pub address: String,
    pub listening_port: Option<u16>,
    pub acknowledged_offset: u64,
}

pub struct ReplicationManager {
    replication_id: String,
    offset: AtomicU64,
    replicas: DashMap<ConnectionId, ReplicaState>,
    listening_ports: DashMap<ConnectionId, u16>,
    acknowledgments: watch::Sender<u64>,
    /// Held while writing to replica channels, so every replica sees the same order
    /// and the offset grows in that order too.
    broadcast: Mutex<()>,
    /// Held by a master from the start of a write until it has been propagated.
    write_order: AsyncMutex<()>,
    /// Frames the running write asked to send after its own, e.g. pops performed for
    /// blocked clients.
    follow_ups: Mutex<Vec<Bytes>>,
}

impl ReplicationManager {
    pub fn new(replication_id: impl Into<String>) -> Self {
        let (acknowledgments, _) = watch::channel(0);

        Self {
            replication_id: replication_id.into(),
            offset: AtomicU64::new(0),
            replicas: DashMap::new(),
            listening_ports: DashMap::new(),
            acknowledgments,
            broadcast: Mutex::new(()),
            write_order: AsyncMutex::new(()),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    pub fn replication_id(&self) -> &str {
        &self.replication_id
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Counts bytes received from the master. Used on replicas only.
    pub fn advance_offset(&self, bytes: usize) -> u64 {
        self.offset.fetch_add(bytes as u64, Ordering::SeqCst) + bytes as u64
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn replicas(&self) -> Vec<ReplicaInfo> {
        self.replicas
            .iter()
            .map(|replica| ReplicaInfo {
                address: replica.address.clone(),
                listening_port: replica.listening_port,
                acknowledged_offset: replica.acknowledged_offset,
            })
            .collect()
    }

    /// Remembers the port announced with `REPLCONF listening-port` until PSYNC.
    pub fn record_listening_port(&self, connection: ConnectionId, port: u16) {
        self.listening_ports.insert(connection, port);
    }

    /// Starts a full resync: queues `+FULLRESYNC <id> <offset>` and the snapshot on
    /// `outbound`, then registers the connection as a caught-up replica. Both happen
    /// under the broadcast lock, so every later write reaches the replica after its
    /// snapshot. Returns the offset the replica starts from.
    pub fn attach_replica(
        &self,
        connection: ConnectionId,
        address: &str,
        outbound: UnboundedSender<Bytes>,
        snapshot: &[u8],
    ) -> Option<u64> {
        let _ordering = self.broadcast.lock().unwrap_or_else(PoisonError::into_inner);
        let offset = self.offset();

        let resync = RespValue::SimpleString(format!(
            "FULLRESYNC {} {}",
            self.replication_id, offset
        ))
        .to_bytes();

        let mut payload = BytesMut::with_capacity(snapshot.len() + 16);
        payload.put_slice(format!("${}\r\n", snapshot.len()).as_bytes());
        payload.put_slice(snapshot);

        if outbound.send(resync).is_err() || outbound.send(payload.freeze()).is_err() {
            warn!(replica = %address, "Replica went away during full resync");
            return None;
        }

        let listening_port = self
            .listening_ports
            .remove(&connection)
            .map(|(_, port)| port);

        self.replicas.insert(
            connection,
            ReplicaState {
                address: address.to_string(),
                listening_port,
                outbound,
                acknowledged_offset: offset,
                expected_offset: offset,
                acknowledged: true,
            },
        );

        info!(replica = %address, offset, "Replica attached");

        Some(offset)
    }

    pub fn remove_replica(&self, connection: ConnectionId) -> bool {
        self.listening_ports.remove(&connection);

        match self.replicas.remove(&connection) {
            Some((_, replica)) => {
                info!(replica = %replica.address, "Replica detached");
                true
            }
            None => false,
        }
    }

    /// Sends a write command verbatim to every replica and advances the offset by
    /// its length. A replica whose channel is closed is evicted.
    pub fn propagate(&self, raw: &Bytes) -> u64 {
        let _ordering = self.broadcast.lock().unwrap_or_else(PoisonError::into_inner);
        let offset = self.offset.fetch_add(raw.len() as u64, Ordering::SeqCst) + raw.len() as u64;

        let mut evicted = Vec::new();

        for mut replica in self.replicas.iter_mut() {
            if replica.outbound.send(raw.clone()).is_err() {
                evicted.push(*replica.key());
                continue;
            }

            replica.expected_offset = offset;
            replica.acknowledged = false;
        }

        self.evict(evicted);

        offset
    }

    /// Serializes writes, so the order they are applied in is the order replicas
    /// receive them. Hold the guard across execution and [`Self::commit`].
    pub async fn order_writes(&self) -> AsyncMutexGuard<'_, ()> {
        self.write_order.lock().await
    }

    /// Queues a frame to go out right after the current write's own frame.
    pub fn follow_up(&self, frame: Bytes) {
        self.follow_ups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
    }

    /// Propagates `frame` (when the write produced one) followed by the queued
    /// follow-ups. Returns the offset afterwards.
    pub fn commit(&self, frame: Option<&Bytes>) -> u64 {
        let follow_ups = std::mem::take(
            &mut *self.follow_ups.lock().unwrap_or_else(PoisonError::into_inner),
        );

        frame
            .into_iter()
            .chain(follow_ups.iter())
            .fold(self.offset(), |_, frame| self.propagate(frame))
    }

    /// Drops the follow-ups of a write that failed.
    pub fn abandon(&self) {
        self.follow_ups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Sends `REPLCONF GETACK *` to every replica. Not counted in the offset.
    pub fn request_acknowledgments(&self) {
        let _ordering = self.broadcast.lock().unwrap_or_else(PoisonError::into_inner);
        let getack = RespValue::array_from_strings(["REPLCONF", "GETACK", "*"]).to_bytes();

        let evicted = self
            .replicas
            .iter()
            .filter(|replica| replica.outbound.send(getack.clone()).is_err())
            .map(|replica| *replica.key())
            .collect();

        self.evict(evicted);
    }

    /// Records `REPLCONF ACK <offset>` from a replica and wakes pending WAIT calls.
    pub fn acknowledge(&self, connection: ConnectionId, offset: u64) {
        match self.replicas.get_mut(&connection) {
            Some(mut replica) => {
                replica.acknowledged_offset = offset;
                replica.acknowledged = offset >= replica.expected_offset;
                debug!(replica = %replica.address, offset, "Replica acknowledged");
            }
            None => {
                debug!(offset, "Acknowledgment from unknown replica ignored");
                return;
            }
        }

        self.acknowledgments.send_modify(|events| *events += 1);
    }

    pub fn acknowledged_count(&self) -> usize {
        self.replicas
            .iter()
            .filter(|replica| replica.is_caught_up())
            .count()
    }

    fn has_lagging_replicas(&self) -> bool {
        self.replicas.iter().any(|replica| replica.is_lagging())
    }

    /// Waits until at least `target` replicas have acknowledged everything sent to
    /// them, or until `timeout` elapses (`None` waits forever). Returns the count
    /// reached either way.
    pub async fn wait_for_acknowledgments(&self, target: usize, timeout: Option<Duration>) -> usize {
        let mut events = self.acknowledgments.subscribe();

        let count = self.acknowledged_count();
        if count >= target {
            return count;
        }

        if self.has_lagging_replicas() {
            self.request_acknowledgments();
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            let count = self.acknowledged_count();
            if count >= target {
                return count;
            }

            let changed = match deadline {
                Some(deadline) => match timeout_at(deadline, events.changed()).await {
                    Ok(changed) => changed,
                    Err(_) => return self.acknowledged_count(),
                },
                None => events.changed().await,
            };

            if changed.is_err() {
                return self.acknowledged_count();
            }
        }
    }

    fn evict(&self, connections: Vec<ConnectionId>) {
        for connection in connections {
            if let Some((_, replica)) = self.replicas.remove(&connection) {
                warn!(replica = %replica.address, "Evicting unreachable replica");
            }
        }
    }
}
