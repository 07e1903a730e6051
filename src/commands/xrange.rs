use crate::{
    commands::{
        stream_utils::{entries_to_resp, parse_range_bound, RangeBound},
        Command, CommandError, CommandFuture, CommandResult,
    },
    connection::Session,
    key_value_store::StreamEntryId,
    server::RedisServer,
};

pub struct XRangeArguments {
    key: String,
    start: StreamEntryId,
    end: StreamEntryId,
}

impl XRangeArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, start, end] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("xrange".to_string()));
        };

        Ok(Self {
            key: key.clone(),
            start: parse_range_bound(start, RangeBound::Start)?,
            end: parse_range_bound(end, RangeBound::End)?,
        })
    }
}

/// Handles the Redis XRANGE command: entries with `start <= id <= end`, oldest first.
pub fn xrange(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let xrange_arguments = XRangeArguments::parse(arguments)?;

    let entries = server
        .store
        .with_stream(&xrange_arguments.key, |stream| {
            stream.range(xrange_arguments.start, xrange_arguments.end)
        })
        .unwrap_or_default();

    Ok(CommandResult::Response(entries_to_resp(entries)))
}

pub struct XRange;

impl Command for XRange {
    fn name(&self) -> &'static str {
        "XRANGE"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { xrange(server, arguments) })
    }
}
