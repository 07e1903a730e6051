//! Per-connection session loops.
//!
//! Every accepted socket is split in two. The read half is driven by the session loop,
//! which decodes pipelined frames and runs them one after another, so replies leave in
//! request order. The write half belongs to a writer task fed through an unbounded
//! channel; anything that needs to reach the connection (replies, pub/sub messages,
//! propagated writes for a replica) goes through that channel.

use std::sync::Arc;

use bytes::Bytes;
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    commands::{CommandHandler, CommandResult},
    input::{CommandReadError, Frame, FrameDecoder},
    rdb::RdbParser,
    replication::client::MasterLink,
    resp::RespValue,
    server::RedisServer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Where a connection's commands come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    /// The replica side of the link to this node's master. Nothing executed on it is
    /// answered, except `REPLCONF GETACK`.
    Master,
}

/// What a command knows about the connection it runs on.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ConnectionId,
    pub address: String,
    pub origin: Origin,
    pub outbound: UnboundedSender<Bytes>,
    /// False while EXEC runs queued commands.
    pub blocking_allowed: bool,
}

impl Session {
    pub fn new(
        id: ConnectionId,
        address: String,
        origin: Origin,
        outbound: UnboundedSender<Bytes>,
    ) -> Self {
        Self {
            id,
            address,
            origin,
            outbound,
            blocking_allowed: true,
        }
    }

    /// Queues a value for the writer task. A closed connection drops it silently.
    pub fn send(&self, value: RespValue) {
        if self.outbound.send(value.to_bytes()).is_err() {
            debug!(client = %self.address, "Dropping reply for closed connection");
        }
    }

    pub fn for_transaction(&self) -> Self {
        Self {
            blocking_allowed: false,
            ..self.clone()
        }
    }
}

/// Drains the outbound channel into the socket until every sender is gone or a write
/// fails.
fn spawn_writer(mut writer: OwnedWriteHalf, address: String) -> (UnboundedSender<Bytes>, JoinHandle<()>) {
    let (outbound, mut pending) = mpsc::unbounded_channel::<Bytes>();

    let task = tokio::spawn(async move {
        while let Some(bytes) = pending.recv().await {
            if let Err(e) = writer.write_all(&bytes).await {
                warn!(client = %address, error = %e, "Error writing to stream");
                break;
            }
        }
    });

    (outbound, task)
}

/// Resolves once the peer has closed its side, without consuming any bytes. Data
/// waiting to be read means the peer is still there, so it never resolves then.
async fn wait_for_disconnect(reader: &mut OwnedReadHalf) {
    let mut peeked = [0; 1];

    match reader.peek(&mut peeked).await {
        Ok(0) | Err(_) => {}
        Ok(_) => std::future::pending::<()>().await,
    }
}

pub async fn handle_client_connection(stream: TcpStream, server: Arc<RedisServer>) {
    let address = stream
        .peer_addr()
        .map(|address| address.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (mut reader, writer) = stream.into_split();
    let (outbound, writer_task) = spawn_writer(writer, address.clone());
    let session = Session::new(server.next_connection_id(), address, Origin::Client, outbound);
    let mut decoder = FrameDecoder::new();

    info!(client = %session.address, "Client connected");

    'session: loop {
        let frames = match decoder.read_frames(&mut reader).await {
            Ok(frames) => frames,
            Err(CommandReadError::ConnectionClosed) => break,
            Err(e) => {
                warn!(client = %session.address, error = %e, "Error reading from connection");
                break;
            }
        };

        for frame in frames {
            let Frame::Command { items, raw } = frame else {
                continue;
            };

            let handler = match CommandHandler::new(&server.commands, items, raw) {
                Ok(handler) => handler,
                Err(e) => {
                    session.send(e.as_resp());
                    continue;
                }
            };

            let result = if handler.is_blocking() {
                tokio::select! {
                    result = handler.handle(&server, &session) => result,
                    _ = wait_for_disconnect(&mut reader) => {
                        debug!(client = %session.address, "Client left while blocked");
                        break 'session;
                    }
                }
            } else {
                handler.handle(&server, &session).await
            };

            if let CommandResult::Response(reply) = result {
                session.send(reply);
            }
        }
    }

    release(&server, &session);
    info!(client = %session.address, "Client disconnected");

    drop(session);
    let _ = writer_task.await;
}

/// Forgets everything the server keeps per connection.
fn release(server: &RedisServer, session: &Session) {
    server.channels.unsubscribe_all(session.id);
    let _ = server.transactions.discard(session.id);
    server.replication.remove_replica(session.id);
}

/// Applies the master's stream on a replica: loads the snapshot, then executes every
/// command without replying, counting each frame's bytes into the replication offset
/// once it has run.
pub async fn run_master_link(link: MasterLink, server: Arc<RedisServer>) {
    let MasterLink {
        stream,
        leftover,
        replication_id,
        offset,
    } = link;

    let address = stream
        .peer_addr()
        .map(|address| address.to_string())
        .unwrap_or_else(|_| "master".to_string());

    info!(master = %address, %replication_id, offset, "Replicating from master");

    let (mut reader, writer) = stream.into_split();
    let (outbound, writer_task) = spawn_writer(writer, address.clone());
    let session = Session::new(server.next_connection_id(), address, Origin::Master, outbound);
    let mut decoder = FrameDecoder::for_master_link(leftover);

    loop {
        let frames = match decoder.read_frames(&mut reader).await {
            Ok(frames) => frames,
            Err(CommandReadError::ConnectionClosed) => break,
            Err(e) => {
                warn!(master = %session.address, error = %e, "Error reading from master");
                break;
            }
        };

        for frame in frames {
            match frame {
                Frame::Snapshot(payload) => match RdbParser::new(&payload).parse() {
                    Ok(snapshot) => {
                        info!(keys = snapshot.entries.len(), "Loaded snapshot from master");
                        server.store.extend(snapshot.entries);
                    }
                    Err(e) => warn!(error = %e, "Ignoring unreadable snapshot from master"),
                },
                Frame::Command { items, raw } => {
                    let length = raw.len();

                    match CommandHandler::new(&server.commands, items, raw) {
                        Ok(handler) => {
                            if let Err(e) = handler.execute(&server, &session).await {
                                warn!(command = %handler.name, error = %e, "Propagated command failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring unknown propagated command"),
                    }

                    server.replication.advance_offset(length);
                }
            }
        }
    }

    warn!(master = %session.address, "Master link closed");

    drop(session);
    let _ = writer_task.await;
}
