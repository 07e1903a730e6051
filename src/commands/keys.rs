use globset::Glob;

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

pub struct KeysArguments {
    pattern: String,
}

impl KeysArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [pattern] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("keys".to_string()));
        };

        Ok(Self {
            pattern: pattern.clone(),
        })
    }
}

/// Handles the Redis KEYS command.
///
/// # Arguments
///
/// * `server` - The shared server state holding the keyspace
/// * `arguments` - A single glob pattern, e.g. `*` or `user:?`
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - An array with every live key matching the pattern,
///   sorted so the reply does not depend on shard iteration order
/// * `Err(CommandError::InvalidPattern)` - If the glob does not compile
pub fn keys(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let matcher = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidPattern(e.to_string()))?
        .compile_matcher();

    let mut matching = server
        .store
        .keys()
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .collect::<Vec<_>>();
    matching.sort();

    Ok(CommandResult::Response(RespValue::array_from_strings(
        matching,
    )))
}

pub struct Keys;

impl Command for Keys {
    fn name(&self) -> &'static str {
        "KEYS"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { keys(server, arguments) })
    }
}
