use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{list, ListEnd},
    resp::RespValue,
    server::RedisServer,
};

pub struct PopArguments {
    key: String,
    count: Option<usize>,
}

impl PopArguments {
    pub fn parse(arguments: &[String], end: ListEnd) -> Result<Self, CommandError> {
        match arguments {
            [key] => Ok(Self {
                key: key.clone(),
                count: None,
            }),
            [key, count] => Ok(Self {
                key: key.clone(),
                count: Some(count.parse::<usize>().map_err(|_| CommandError::NotAnInteger)?),
            }),
            _ => Err(CommandError::WrongNumberOfArguments(
                end.pop_command().to_lowercase(),
            )),
        }
    }
}

/// Handles the Redis LPOP and RPOP commands.
///
/// Removes and returns one or more elements from the given end of a list.
///
/// # Arguments
///
/// * `server` - The shared server state holding the keyspace
/// * `arguments` - A slice containing:
///   - 1 element: [key] - pops one element
///   - 2 elements: [key, count] - pops up to `count` elements
///
/// # Returns
///
/// * `Ok(CommandResult::Response)`:
///   - Bulk string when no count, or a count of 1, was given
///   - Array of the popped elements for any other count
///   - Null bulk string when the key does not exist
/// * `Err(CommandError::NotAnInteger)` - If count is not a non-negative integer
/// * `Err(CommandError::Store)` - If the key holds something other than a list
pub fn pop(
    server: &RedisServer,
    arguments: &[String],
    end: ListEnd,
) -> Result<CommandResult, CommandError> {
    let pop_arguments = PopArguments::parse(arguments, end)?;

    let popped = server.store.update_list(&pop_arguments.key, |stored| {
        stored.map(|stored| list::pop(stored, end, pop_arguments.count.unwrap_or(1)))
    })?;

    let Some(mut popped) = popped else {
        return Ok(CommandResult::Response(RespValue::NullBulkString));
    };

    Ok(CommandResult::Response(match pop_arguments.count {
        None | Some(1) => match popped.pop() {
            Some(value) => RespValue::BulkString(value),
            None => RespValue::NullBulkString,
        },
        Some(_) => RespValue::array_from_strings(popped),
    }))
}

pub struct LPop;

impl Command for LPop {
    fn name(&self) -> &'static str {
        "LPOP"
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
        Box::pin(async move { pop(server, arguments, ListEnd::Left) })
    }
}

pub struct RPop;

impl Command for RPop {
    fn name(&self) -> &'static str {
        "RPOP"
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
        Box::pin(async move { pop(server, arguments, ListEnd::Right) })
    }
}
