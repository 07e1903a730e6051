use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::BytesMut;
use redkv::{
    input::read_reply,
    resp::RespValue,
    server::{bind, serve, RedisRole, RedisServer, ServerConfig},
};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

/// How long any single reply may take before a test fails.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server bound to an ephemeral port.
pub struct TestEnv {
    pub server: Arc<RedisServer>,
    pub address: SocketAddr,
}

impl TestEnv {
    pub async fn new_master_server() -> Self {
        Self::start(ServerConfig {
            port: 0,
            ..ServerConfig::default()
        })
        .await
    }

    /// Starts a replica and waits for its handshake with the master at `master_port`.
    pub async fn new_replica_server(master_port: u16) -> Self {
        Self::start(ServerConfig {
            port: 0,
            role: RedisRole::Replica {
                host: "127.0.0.1".to_string(),
                port: master_port,
            },
            ..ServerConfig::default()
        })
        .await
    }

    async fn start(config: ServerConfig) -> Self {
        let (listener, server) = bind(config).await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(serve(listener, Arc::clone(&server)));

        Self { server, address }
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.address).await
    }
}

/// A raw RESP connection.
pub struct TestClient {
    pub stream: TcpStream,
    buffer: BytesMut,
}

impl TestClient {
    pub async fn connect(address: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(address).await.unwrap(),
            buffer: BytesMut::new(),
        }
    }

    pub async fn send(&mut self, command: RespValue) {
        self.stream
            .write_all(command.encode().as_bytes())
            .await
            .unwrap();
    }

    pub async fn read(&mut self) -> RespValue {
        timeout(REPLY_TIMEOUT, read_reply(&mut self.stream, &mut self.buffer))
            .await
            .expect("timed out waiting for a reply")
            .unwrap()
    }

    pub async fn request(&mut self, command: RespValue) -> RespValue {
        self.send(command).await;
        self.read().await
    }

    /// Sends `command` and asserts the reply.
    pub async fn assert_reply(&mut self, command: RespValue, expected: RespValue) {
        let description = command.encode();
        let reply = self.request(command).await;

        assert_eq!(reply, expected, "reply to {:?}", description);
    }
}

/// Command builders and reply shorthands.
pub struct TestUtils;

impl TestUtils {
    pub fn command(items: &[&str]) -> RespValue {
        RespValue::array_from_strings(items.iter().copied())
    }

    pub fn ok() -> RespValue {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn bulk(value: &str) -> RespValue {
        RespValue::BulkString(value.to_string())
    }

    pub fn bulk_array(values: &[&str]) -> RespValue {
        RespValue::array_from_strings(values.iter().copied())
    }

    pub fn error(message: &str) -> RespValue {
        RespValue::Error(message.to_string())
    }

    pub fn ping_command() -> RespValue {
        Self::command(&["PING"])
    }

    pub fn set_command(key: &str, value: &str) -> RespValue {
        Self::command(&["SET", key, value])
    }

    pub fn get_command(key: &str) -> RespValue {
        Self::command(&["GET", key])
    }

    pub fn rpush_command(key: &str, values: &[&str]) -> RespValue {
        let mut items = vec!["RPUSH", key];
        items.extend_from_slice(values);
        Self::command(&items)
    }

    pub fn blpop_command(key: &str, timeout_seconds: &str) -> RespValue {
        Self::command(&["BLPOP", key, timeout_seconds])
    }

    pub fn xadd_command(key: &str, id: &str, fields: &[&str]) -> RespValue {
        let mut items = vec!["XADD", key, id];
        items.extend_from_slice(fields);
        Self::command(&items)
    }

    pub fn wait_command(replicas: &str, timeout_ms: &str) -> RespValue {
        Self::command(&["WAIT", replicas, timeout_ms])
    }

    /// Polls until `check` passes, failing after [`REPLY_TIMEOUT`].
    pub async fn eventually<F>(mut check: F)
    where
        F: FnMut() -> bool,
    {
        timeout(REPLY_TIMEOUT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition never became true");
    }
}
