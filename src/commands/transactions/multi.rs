use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Opens a transaction for the connection. Nested MULTI is an error and leaves the
/// open transaction untouched.
pub fn multi(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("multi".to_string()));
    }

    server.transactions.begin(session.id)?;

    Ok(CommandResult::Response(RespValue::SimpleString(
        "OK".to_string(),
    )))
}

pub struct Multi;

impl Command for Multi {
    fn name(&self) -> &'static str {
        "MULTI"
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
        Box::pin(async move { multi(server, session, arguments) })
    }
}
