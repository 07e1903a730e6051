use tracing::debug;

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles the handshake forms of REPLCONF: `listening-port <port>` and
/// `capa <capability> [...]`, both answered with `+OK`.
pub fn replconf(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let Some((option, values)) = arguments.split_first() else {
        return Err(CommandError::WrongNumberOfArguments("replconf".to_string()));
    };

    match (option.to_lowercase().as_str(), values) {
        ("listening-port", [port]) => {
            let port = port.parse::<u16>().map_err(|_| CommandError::NotAnInteger)?;
            server.replication.record_listening_port(session.id, port);
        }
        ("capa", capabilities) if !capabilities.is_empty() => {
            debug!(client = %session.address, capabilities = ?capabilities, "Replica capabilities");
        }
        ("listening-port" | "capa", _) => return Err(CommandError::SyntaxError),
        (option, _) => return Err(CommandError::InvalidReplconfOption(option.to_string())),
    }

    Ok(CommandResult::Response(RespValue::SimpleString(
        "OK".to_string(),
    )))
}

/// `REPLCONF GETACK *`, sent by the master. The replica answers on the same link with
/// `REPLCONF ACK <offset>`, the offset covering every byte received before this frame.
pub fn replconf_getack(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments(
            "replconf|getack".to_string(),
        ));
    }

    let offset = server.replication.offset();

    session.send(RespValue::array_from_strings([
        "REPLCONF".to_string(),
        "ACK".to_string(),
        offset.to_string(),
    ]));

    Ok(CommandResult::AlreadyStreamed)
}

/// `REPLCONF ACK <offset>`, sent by a replica. Never replied to.
pub fn replconf_ack(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let [offset] = arguments else {
        return Err(CommandError::WrongNumberOfArguments(
            "replconf|ack".to_string(),
        ));
    };

    let offset = offset.parse::<u64>().map_err(|_| CommandError::NotAnInteger)?;
    server.replication.acknowledge(session.id, offset);

    Ok(CommandResult::NoResponse)
}

pub struct Replconf;

impl Command for Replconf {
    fn name(&self) -> &'static str {
        "REPLCONF"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { replconf(server, session, arguments) })
    }
}

pub struct ReplconfGetAck;

impl Command for ReplconfGetAck {
    fn name(&self) -> &'static str {
        "REPLCONF GETACK"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { replconf_getack(server, session, arguments) })
    }
}

pub struct ReplconfAck;

impl Command for ReplconfAck {
    fn name(&self) -> &'static str {
        "REPLCONF ACK"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { replconf_ack(server, session, arguments) })
    }
}
