use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

pub struct PingArguments {
    message: Option<String>,
}

impl PingArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        match arguments {
            [] => Ok(Self { message: None }),
            [message] => Ok(Self {
                message: Some(message.clone()),
            }),
            _ => Err(CommandError::WrongNumberOfArguments("ping".to_string())),
        }
    }
}

/// Replies `PONG`, or echoes the optional message. A subscribed connection gets the
/// pub/sub shaped reply `["pong", message]`.
pub fn ping(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let ping_arguments = PingArguments::parse(arguments)?;

    if server.channels.is_subscribed(session.id) {
        return Ok(CommandResult::Response(RespValue::array_from_strings([
            "pong".to_string(),
            ping_arguments.message.unwrap_or_default(),
        ])));
    }

    Ok(CommandResult::Response(match ping_arguments.message {
        Some(message) => RespValue::BulkString(message),
        None => RespValue::SimpleString("PONG".to_string()),
    }))
}

pub struct Ping;

impl Command for Ping {
    fn name(&self) -> &'static str {
        "PING"
    }

    fn allowed_while_subscribed(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { ping(server, session, arguments) })
    }
}
