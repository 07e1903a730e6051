use crate::{
    commands::{blpop::propagate_pops, Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{list, ListEnd},
    resp::RespValue,
    server::RedisServer,
};

pub struct PushArguments {
    key: String,
    values: Vec<String>,
}

impl PushArguments {
    pub fn parse(arguments: &[String], end: ListEnd) -> Result<Self, CommandError> {
        let Some((key, values)) = arguments.split_first().filter(|(_, values)| !values.is_empty())
        else {
            let name = match end {
                ListEnd::Left => "lpush",
                ListEnd::Right => "rpush",
            };
            return Err(CommandError::WrongNumberOfArguments(name.to_string()));
        };

        Ok(Self {
            key: key.clone(),
            values: values.to_vec(),
        })
    }
}

/// Pushes the values, then hands elements to clients blocked on the key, all under
/// the key's lock.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The list length right after the push, before any
///   blocked client took its element
/// * `Err(CommandError::Store)` - If the key holds something other than a list
pub fn push(
    server: &RedisServer,
    arguments: &[String],
    end: ListEnd,
) -> Result<CommandResult, CommandError> {
    let push_arguments = PushArguments::parse(arguments, end)?;
    let key = push_arguments.key.as_str();

    let (length, served) = server.store.upsert_list(key, |stored| {
        let length = list::push(stored, end, push_arguments.values);
        let served = server.list_waiters.serve_list(key, stored);

        (length, served)
    })?;

    propagate_pops(server, key, &served);

    Ok(CommandResult::Response(RespValue::Integer(length as i64)))
}

pub struct RPush;

impl Command for RPush {
    fn name(&self) -> &'static str {
        "RPUSH"
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
        Box::pin(async move { push(server, arguments, ListEnd::Right) })
    }
}

pub struct LPush;

impl Command for LPush {
    fn name(&self) -> &'static str {
        "LPUSH"
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
        Box::pin(async move { push(server, arguments, ListEnd::Left) })
    }
}
