use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Delivers the message to every subscriber of the channel and replies with how many
/// there were.
pub fn publish(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [channel, message] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("publish".to_string()));
    };

    let receivers = server.channels.publish(channel, message);

    Ok(CommandResult::Response(RespValue::Integer(receivers as i64)))
}

pub struct Publish;

impl Command for Publish {
    fn name(&self) -> &'static str {
        "PUBLISH"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { publish(server, arguments) })
    }
}
