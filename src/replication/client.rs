use bytes::BytesMut;
use regex::Regex;
use tokio::{io::AsyncWriteExt, net::TcpStream};
use tracing::debug;

use crate::{
    input::{read_reply, CommandReadError},
    resp::RespValue,
};

/// An established link to the master, right after `+FULLRESYNC`.
#[derive(Debug)]
pub struct MasterLink {
    pub stream: TcpStream,
    /// Bytes already read past the `+FULLRESYNC` line (usually the snapshot).
    pub leftover: BytesMut,
    pub replication_id: String,
    pub offset: u64,
}

/// Connects to the master and runs the handshake, one step at a time:
/// PING, REPLCONF listening-port, REPLCONF capa psync2, PSYNC ? -1.
pub async fn connect_to_master(
    host: &str,
    port: u16,
    listening_port: u16,
) -> Result<MasterLink, CommandReadError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| CommandReadError::IoError(e.to_string()))?;

    let mut buffer = BytesMut::new();

    exchange(&mut stream, &mut buffer, &["PING"], "PONG").await?;
    exchange(
        &mut stream,
        &mut buffer,
        &["REPLCONF", "listening-port", &listening_port.to_string()],
        "OK",
    )
    .await?;
    exchange(&mut stream, &mut buffer, &["REPLCONF", "capa", "psync2"], "OK").await?;

    send(&mut stream, &["PSYNC", "?", "-1"]).await?;
    let reply = read_reply(&mut stream, &mut buffer).await?;
    let (replication_id, offset) = parse_full_resync(&reply)?;

    debug!(%replication_id, offset, "Full resync accepted by master");

    Ok(MasterLink {
        stream,
        leftover: buffer,
        replication_id,
        offset,
    })
}

async fn send(stream: &mut TcpStream, command: &[&str]) -> Result<(), CommandReadError> {
    debug!(command = ?command, "Handshake step");

    stream
        .write_all(RespValue::encode_array_from_strings(command.iter().copied()).as_bytes())
        .await
        .map_err(|e| CommandReadError::IoError(e.to_string()))
}

async fn exchange(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    command: &[&str],
    expected: &str,
) -> Result<(), CommandReadError> {
    send(stream, command).await?;

    match read_reply(stream, buffer).await? {
        RespValue::SimpleString(reply) if reply.eq_ignore_ascii_case(expected) => Ok(()),
        reply => Err(CommandReadError::InvalidResponseFromMaster(format!(
            "expected +{} after {}, got {}",
            expected,
            command.join(" "),
            reply.encode().trim_end()
        ))),
    }
}

/// Extracts the replication ID and offset from `+FULLRESYNC <id> <offset>`.
pub fn parse_full_resync(reply: &RespValue) -> Result<(String, u64), CommandReadError> {
    let invalid = || {
        CommandReadError::InvalidResponseFromMaster(format!(
            "expected +FULLRESYNC, got {}",
            reply.encode().trim_end()
        ))
    };

    let RespValue::SimpleString(line) = reply else {
        return Err(invalid());
    };

    let pattern = Regex::new(r"^FULLRESYNC ([A-Za-z0-9]{40}) (\d+)$")
        .map_err(|e| CommandReadError::InvalidResponseFromMaster(e.to_string()))?;

    let captures = pattern.captures(line).ok_or_else(invalid)?;
    let offset = captures[2].parse::<u64>().map_err(|_| invalid())?;

    Ok((captures[1].to_string(), offset))
}
