use jiff::Timestamp;

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{IdRequest, StreamFields},
    resp::RespValue,
    server::RedisServer,
};

pub struct XAddArguments {
    key: String,
    id: IdRequest,
    fields: StreamFields,
}

impl XAddArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, id, pairs @ ..] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("xadd".to_string()));
        };

        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xadd".to_string()));
        }

        Ok(Self {
            key: key.clone(),
            id: id.parse()?,
            fields: pairs
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
        })
    }
}

/// Handles the Redis XADD command.
///
/// Appends one entry and resolves every XREAD blocked on the key whose watermark the
/// stream has now passed. A rejected ID leaves the stream unchanged.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The ID of the new entry as a bulk string
/// * `Err(CommandError::InvalidStreamId)` - If the ID is malformed, `0-0`, or not greater
///   than the last entry's ID
pub fn xadd(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let xadd_arguments = XAddArguments::parse(arguments)?;
    let key = xadd_arguments.key.as_str();
    let now_ms = u64::try_from(Timestamp::now().as_millisecond()).unwrap_or_default();

    let id = server.store.upsert_stream(key, |stream| {
        let id = stream.append(xadd_arguments.id, xadd_arguments.fields, now_ms)?;
        server.stream_waiters.serve_stream(key, stream);

        Ok::<_, CommandError>(id)
    })??;

    Ok(CommandResult::Response(RespValue::BulkString(id.to_string())))
}

pub struct XAdd;

impl Command for XAdd {
    fn name(&self) -> &'static str {
        "XADD"
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
        Box::pin(async move { xadd(server, arguments) })
    }
}
