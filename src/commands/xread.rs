use crate::{
    blocking::{BlockingTimeout, Registration, Resolver, WaitCondition},
    commands::{stream_utils::streams_to_resp, Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{StreamEntry, StreamEntryId},
    resp::RespValue,
    server::RedisServer,
};

/// The ID an XREAD reads after, as given by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadFrom {
    /// `$`: whatever the stream's last ID is when the command runs.
    Latest,
    After(StreamEntryId),
}

/// Parsed arguments of `XREAD [BLOCK <ms>] STREAMS key [key ...] id [id ...]`.
#[derive(Debug, PartialEq)]
pub struct XReadArguments {
    block: Option<BlockingTimeout>,
    streams: Vec<(String, ReadFrom)>,
}

impl XReadArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let mut block = None;
        let mut remaining = arguments;

        loop {
            match remaining {
                [option, milliseconds, rest @ ..] if option.eq_ignore_ascii_case("BLOCK") => {
                    let milliseconds = milliseconds
                        .parse::<u64>()
                        .map_err(|_| CommandError::InvalidTimeout)?;

                    block = Some(BlockingTimeout::from_millis(milliseconds));
                    remaining = rest;
                }
                [option, rest @ ..] if option.eq_ignore_ascii_case("STREAMS") => {
                    remaining = rest;
                    break;
                }
                [] => return Err(CommandError::WrongNumberOfArguments("xread".to_string())),
                _ => return Err(CommandError::SyntaxError),
            }
        }

        if remaining.is_empty() || remaining.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xread".to_string()));
        }

        let (keys, ids) = remaining.split_at(remaining.len() / 2);

        let streams = keys
            .iter()
            .zip(ids)
            .map(|(key, id)| -> Result<(String, ReadFrom), CommandError> {
                let from = match id.as_str() {
                    "$" => ReadFrom::Latest,
                    id => ReadFrom::After(StreamEntryId::parse_bound(id, 0)?),
                };

                Ok((key.clone(), from))
            })
            .collect::<Result<Vec<_>, CommandError>>()?;

        Ok(Self { block, streams })
    }
}

enum Attempt {
    Found(Vec<StreamEntry>),
    Registered,
    AlreadyServed,
}

/// Handles the Redis XREAD command.
///
/// Without BLOCK (or inside a transaction) the call answers from what is there now:
/// every listed stream that has entries after its ID, or a null array. With BLOCK
/// and nothing to return it waits for the first XADD to any listed stream that moves
/// past the requested ID, and replies with that stream alone.
pub async fn xread(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XReadArguments::parse(arguments)?;

    let watermarks = xread_arguments
        .streams
        .into_iter()
        .map(|(key, from)| -> Result<(String, StreamEntryId), CommandError> {
            let watermark = match from {
                ReadFrom::After(id) => id,
                ReadFrom::Latest => server
                    .store
                    .read_stream(&key, |stream| stream.last_id())?
                    .unwrap_or(StreamEntryId::ZERO),
            };

            Ok((key, watermark))
        })
        .collect::<Result<Vec<_>, CommandError>>()?;

    let mut available = Vec::new();

    for (key, watermark) in &watermarks {
        let entries = server
            .store
            .read_stream(key, |stream| stream.entries_after(*watermark))?
            .unwrap_or_default();

        if !entries.is_empty() {
            available.push((key.clone(), entries));
        }
    }

    if !available.is_empty() {
        return Ok(CommandResult::Response(streams_to_resp(available)));
    }

    let timeout = match xread_arguments.block {
        Some(timeout) if session.blocking_allowed => timeout,
        _ => return Ok(CommandResult::Response(RespValue::NullArray)),
    };

    let (resolver, mut receiver) = Resolver::new();
    let mut registration = Registration::new(&server.stream_waiters);

    for (key, watermark) in &watermarks {
        let attempt = server.store.update_stream(key, |stream| {
            let entries = stream
                .map(|stream| stream.entries_after(*watermark))
                .unwrap_or_default();

            if entries.is_empty() {
                registration.register(key, WaitCondition::EntriesAfter(*watermark), &resolver);
                return Attempt::Registered;
            }

            match resolver.claim() {
                Some(_) => Attempt::Found(entries),
                None => Attempt::AlreadyServed,
            }
        });

        match attempt {
            Ok(Attempt::Found(entries)) => {
                return Ok(CommandResult::Response(streams_to_resp(vec![(
                    key.clone(),
                    entries,
                )])));
            }
            Ok(Attempt::Registered) => {}
            Ok(Attempt::AlreadyServed) => break,
            Err(e) => {
                if resolver.claim().is_some() {
                    return Err(e.into());
                }
                break;
            }
        }
    }

    let delivery = match timeout {
        BlockingTimeout::Forever => receiver.await.ok(),
        BlockingTimeout::After(duration) => {
            match tokio::time::timeout(duration, &mut receiver).await {
                Ok(delivery) => delivery.ok(),
                Err(_) => match resolver.claim() {
                    Some(_) => None,
                    None => receiver.await.ok(),
                },
            }
        }
    };

    drop(registration);

    Ok(CommandResult::Response(match delivery {
        Some(stream) => streams_to_resp(vec![stream]),
        None => RespValue::NullArray,
    }))
}

pub struct XRead;

impl Command for XRead {
    fn name(&self) -> &'static str {
        "XREAD"
    }

    fn is_blocking(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(xread(server, session, arguments))
    }
}
