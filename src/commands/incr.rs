use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles the Redis INCR command.
///
/// An absent key counts as 0, so the first INCR yields 1. The expiration of an
/// existing key is kept.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The incremented value as an integer
/// * `Err(CommandError::Store)` - If the key holds a non-integer string or another kind
pub fn incr(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("incr".to_string()));
    };

    let value = server.store.increment(key, 1)?;

    Ok(CommandResult::Response(RespValue::Integer(value)))
}

pub struct Incr;

impl Command for Incr {
    fn name(&self) -> &'static str {
        "INCR"
    }

    fn is_write(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { incr(server, arguments) })
    }
}
