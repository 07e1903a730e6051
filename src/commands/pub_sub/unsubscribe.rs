use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

fn confirmation(channel: Option<&str>, remaining: usize) -> RespValue {
    RespValue::Array(vec![
        RespValue::bulk("unsubscribe"),
        channel.map_or(RespValue::NullBulkString, RespValue::bulk),
        RespValue::Integer(remaining as i64),
    ])
}

/// Handles the Redis UNSUBSCRIBE command.
///
/// Without arguments the connection leaves every channel it is on. One confirmation,
/// `["unsubscribe", channel, remaining]`, is written per channel; with nothing to
/// leave a single confirmation with a null channel is written.
pub fn unsubscribe(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let left = if arguments.is_empty() {
        server.channels.unsubscribe_all(session.id)
    } else {
        arguments
            .iter()
            .map(|channel| {
                let remaining = server.channels.unsubscribe(session.id, channel);
                (channel.clone(), remaining)
            })
            .collect()
    };

    if left.is_empty() {
        session.send(confirmation(None, 0));
    }

    for (channel, remaining) in left {
        session.send(confirmation(Some(&channel), remaining));
    }

    Ok(CommandResult::AlreadyStreamed)
}

pub struct Unsubscribe;

impl Command for Unsubscribe {
    fn name(&self) -> &'static str {
        "UNSUBSCRIBE"
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
        Box::pin(async move { unsubscribe(server, session, arguments) })
    }
}
