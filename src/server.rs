use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::Context;
use bytes::Bytes;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    blocking::{ListDelivery, StreamDelivery, WaiterRegistry},
    commands::CommandRegistry,
    connection::{handle_client_connection, run_master_link, ConnectionId},
    key_value_store::KeyValueStore,
    pub_sub::ChannelManager,
    rdb::{empty_snapshot, load_snapshot_file, RdbError},
    replication::{client::connect_to_master, ReplicationManager, DEFAULT_REPLICATION_ID},
    transactions::TransactionManager,
};

const DEFAULT_PORT: u16 = 6379;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag '{0}'")]
    InvalidCommandLineFlag(String),
    #[error("Invalid value for command line flag '{0}'")]
    InvalidCommandLineFlagValue(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedisRole {
    Master,
    Replica { host: String, port: u16 },
}

impl RedisRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedisRole::Master => "master",
            RedisRole::Replica { .. } => "slave",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub dir: String,
    pub dbfilename: String,
    pub role: RedisRole,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            dir: String::new(),
            dbfilename: String::new(),
            role: RedisRole::Master,
        }
    }
}

impl ServerConfig {
    /// Parses the process arguments, program name included.
    ///
    /// Accepted flags: `--port <1-65535>`, `--dir <path>`, `--dbfilename <name>` and
    /// `--replicaof "<host> <port>"`.
    pub fn parse<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut config = Self::default();

        while let Some(flag) = iter.next() {
            let Some(value) = iter.next() else {
                return Err(CliError::InvalidCommandLineFlagValue(flag));
            };

            match flag.as_str() {
                "--port" => {
                    config.port = value
                        .parse::<u16>()
                        .ok()
                        .filter(|port| *port > 0)
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(flag.clone()))?;
                }
                "--dir" => config.dir = value,
                "--dbfilename" => config.dbfilename = value,
                "--replicaof" => {
                    let mut parts = value.split_whitespace();

                    let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next())
                    else {
                        return Err(CliError::InvalidCommandLineFlagValue(flag));
                    };

                    let port = port
                        .parse::<u16>()
                        .ok()
                        .filter(|port| *port > 0)
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(flag.clone()))?;

                    config.role = RedisRole::Replica {
                        host: host.to_string(),
                        port,
                    };
                }
                _ => return Err(CliError::InvalidCommandLineFlag(flag)),
            }
        }

        Ok(config)
    }
}

/// State shared by every connection.
pub struct RedisServer {
    pub config: ServerConfig,
    pub store: KeyValueStore,
    pub list_waiters: WaiterRegistry<ListDelivery>,
    pub stream_waiters: WaiterRegistry<StreamDelivery>,
    pub transactions: TransactionManager,
    pub channels: ChannelManager,
    pub replication: ReplicationManager,
    pub commands: CommandRegistry,
    /// Sent to replicas on full resync.
    pub empty_snapshot: Bytes,
    next_connection_id: AtomicU64,
}

impl RedisServer {
    pub fn new(config: ServerConfig) -> Result<Self, RdbError> {
        Ok(Self {
            config,
            store: KeyValueStore::new(),
            list_waiters: WaiterRegistry::new(),
            stream_waiters: WaiterRegistry::new(),
            transactions: TransactionManager::new(),
            channels: ChannelManager::new(),
            replication: ReplicationManager::new(DEFAULT_REPLICATION_ID),
            commands: CommandRegistry::new(),
            empty_snapshot: empty_snapshot()?,
            next_connection_id: AtomicU64::new(1),
        })
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Loads the snapshot, binds the listener and, on a replica, completes the handshake
/// with the master before returning. Port 0 binds an ephemeral port, which is then
/// what `config.port` reports.
pub async fn bind(mut config: ServerConfig) -> anyhow::Result<(TcpListener, Arc<RedisServer>)> {
    let entries = load_snapshot_file(&config.dir, &config.dbfilename).await?;

    let listener = TcpListener::bind(("127.0.0.1", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    let local_address = listener.local_addr()?;
    config.port = local_address.port();

    let server = Arc::new(RedisServer::new(config)?);
    server.store.extend(entries);

    info!(address = %local_address, role = server.config.role.as_str(), "Listening");

    if let RedisRole::Replica { host, port } = &server.config.role {
        let link = connect_to_master(host, *port, server.config.port)
            .await
            .with_context(|| format!("handshake with master {}:{}", host, port))?;

        tokio::spawn(run_master_link(link, Arc::clone(&server)));
    }

    Ok((listener, server))
}

/// Accepts connections forever, one task each.
pub async fn serve(listener: TcpListener, server: Arc<RedisServer>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(handle_client_connection(stream, Arc::clone(&server)));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let (listener, server) = bind(config).await?;
    serve(listener, server).await;

    Ok(())
}
