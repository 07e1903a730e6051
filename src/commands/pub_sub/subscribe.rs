use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles the Redis SUBSCRIBE command.
///
/// Each channel gets its own confirmation, `["subscribe", channel, count]`, where
/// `count` is the number of channels the connection is subscribed to after it. The
/// confirmations are written straight to the connection, so the command reports
/// [`CommandResult::AlreadyStreamed`].
pub fn subscribe(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("subscribe".to_string()));
    }

    for channel in arguments {
        let count = server
            .channels
            .subscribe(session.id, channel, session.outbound.clone());

        session.send(RespValue::Array(vec![
            RespValue::bulk("subscribe"),
            RespValue::bulk(channel.as_str()),
            RespValue::Integer(count as i64),
        ]));
    }

    Ok(CommandResult::AlreadyStreamed)
}

pub struct Subscribe;

impl Command for Subscribe {
    fn name(&self) -> &'static str {
        "SUBSCRIBE"
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
        Box::pin(async move { subscribe(server, session, arguments) })
    }
}
