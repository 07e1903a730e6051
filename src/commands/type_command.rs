use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Replies with the kind stored at the key, or `none`.
pub fn type_command(
    server: &RedisServer,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("type".to_string()));
    };

    let type_name = server.store.type_of(key).unwrap_or("none");

    Ok(CommandResult::Response(RespValue::SimpleString(
        type_name.to_string(),
    )))
}

pub struct Type;

impl Command for Type {
    fn name(&self) -> &'static str {
        "TYPE"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { type_command(server, arguments) })
    }
}
