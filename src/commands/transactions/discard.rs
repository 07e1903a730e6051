use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Drops the queued commands without running any of them.
pub fn discard(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("discard".to_string()));
    }

    server.transactions.discard(session.id)?;

    Ok(CommandResult::Response(RespValue::SimpleString(
        "OK".to_string(),
    )))
}

pub struct Discard;

impl Command for Discard {
    fn name(&self) -> &'static str {
        "DISCARD"
    }

    fn is_transaction_control(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { discard(server, session, arguments) })
    }
}
