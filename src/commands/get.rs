use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles the Redis GET command.
///
/// Expired keys and keys holding something other than a string read as absent.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The value as a bulk string, or a null bulk string
/// * `Err(CommandError::WrongNumberOfArguments)` - If there is not exactly one argument
pub fn get(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("get".to_string()));
    };

    Ok(CommandResult::Response(match server.store.get_string(key) {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    }))
}

pub struct Get;

impl Command for Get {
    fn name(&self) -> &'static str {
        "GET"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { get(server, arguments) })
    }
}
