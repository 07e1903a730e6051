use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles `CONFIG GET <parameter>`.
///
/// Known parameters are `dir`, `dbfilename` and `port`. Anything else yields an
/// empty array, the same as a glob matching nothing.
pub fn config_get(
    server: &RedisServer,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let [parameter] = arguments else {
        return Err(CommandError::WrongNumberOfArguments(
            "config|get".to_string(),
        ));
    };

    let parameter = parameter.to_lowercase();

    let value = match parameter.as_str() {
        "dir" => Some(server.config.dir.clone()),
        "dbfilename" => Some(server.config.dbfilename.clone()),
        "port" => Some(server.config.port.to_string()),
        _ => None,
    };

    Ok(CommandResult::Response(match value {
        Some(value) => RespValue::array_from_strings([parameter, value]),
        None => RespValue::Array(Vec::new()),
    }))
}

pub struct ConfigGet;

impl Command for ConfigGet {
    fn name(&self) -> &'static str {
        "CONFIG GET"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { config_get(server, arguments) })
    }
}
