use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::list,
    resp::RespValue,
    server::RedisServer,
};

pub struct LRangeArguments {
    key: String,
    start: isize,
    stop: isize,
}

impl LRangeArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, start, stop] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("lrange".to_string()));
        };

        Ok(Self {
            key: key.clone(),
            start: start.parse().map_err(|_| CommandError::NotAnInteger)?,
            stop: stop.parse().map_err(|_| CommandError::NotAnInteger)?,
        })
    }
}

/// Handles the Redis LRANGE command.
///
/// Both indexes are inclusive and may be negative, counting from the tail. Out of
/// range indexes are clamped; an absent key is an empty list.
pub fn lrange(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let lrange_arguments = LRangeArguments::parse(arguments)?;

    let values = server
        .store
        .with_list(&lrange_arguments.key, |stored| {
            list::range(stored, lrange_arguments.start, lrange_arguments.stop)
        })
        .unwrap_or_default();

    Ok(CommandResult::Response(RespValue::array_from_strings(values)))
}

pub struct LRange;

impl Command for LRange {
    fn name(&self) -> &'static str {
        "LRANGE"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { lrange(server, arguments) })
    }
}
