use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles the Redis ECHO command.
///
/// # Arguments
///
/// * `arguments` - Exactly one string, returned as is
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - A bulk string holding the argument
/// * `Err(CommandError::WrongNumberOfArguments)` - If there is not exactly one argument
pub fn echo(arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [message] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("echo".to_string()));
    };

    Ok(CommandResult::Response(RespValue::BulkString(message.clone())))
}

pub struct Echo;

impl Command for Echo {
    fn name(&self) -> &'static str {
        "ECHO"
    }

    fn execute<'a>(
        &'a self,
        _server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { echo(arguments) })
    }
}
