use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Length of the list at the key, 0 when absent.
pub fn llen(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("llen".to_string()));
    };

    let length = server.store.with_list(key, |list| list.len()).unwrap_or(0);

    Ok(CommandResult::Response(RespValue::Integer(length as i64)))
}

pub struct LLen;

impl Command for LLen {
    fn name(&self) -> &'static str {
        "LLEN"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { llen(server, arguments) })
    }
}
