use bytes::Bytes;

use crate::{
    blocking::{BlockingTimeout, Registration, Resolver, WaitCondition},
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{list, ListEnd},
    resp::RespValue,
    server::{RedisRole, RedisServer},
};

#[derive(Debug, PartialEq)]
pub struct BlockingPopArguments {
    keys: Vec<String>,
    timeout: BlockingTimeout,
}

impl BlockingPopArguments {
    /// `key [key ...] timeout`, the timeout in (possibly fractional) seconds.
    pub fn parse(arguments: &[String], end: ListEnd) -> Result<Self, CommandError> {
        let Some((timeout, keys)) = arguments.split_last().filter(|(_, keys)| !keys.is_empty())
        else {
            let name = match end {
                ListEnd::Left => "blpop",
                ListEnd::Right => "brpop",
            };
            return Err(CommandError::WrongNumberOfArguments(name.to_string()));
        };

        let timeout = timeout
            .parse::<f64>()
            .ok()
            .and_then(BlockingTimeout::from_seconds)
            .ok_or(CommandError::InvalidTimeout)?;

        Ok(Self {
            keys: keys.to_vec(),
            timeout,
        })
    }
}

enum Attempt {
    Popped(String),
    Registered,
    /// A producer claimed this call before the key could be checked.
    AlreadyServed,
}

/// Queues the pops a master performed for blocked clients as plain
/// `LPOP`/`RPOP key count` frames, so replicas drop the same elements. They go out
/// with the next [`crate::replication::ReplicationManager::commit`].
pub fn propagate_pops(server: &RedisServer, key: &str, served: &[ListEnd]) {
    if server.config.role != RedisRole::Master {
        return;
    }

    let mut groups: Vec<(ListEnd, usize)> = Vec::new();

    for end in served {
        match groups.last_mut() {
            Some((last, count)) if last == end => *count += 1,
            _ => groups.push((*end, 1)),
        }
    }

    for (end, count) in groups {
        let frame = RespValue::encode_array_from_strings([
            end.pop_command().to_string(),
            key.to_string(),
            count.to_string(),
        ]);

        server.replication.follow_up(Bytes::from(frame));
    }
}

fn popped_reply(key: &str, value: String) -> CommandResult {
    CommandResult::Response(RespValue::array_from_strings([key.to_string(), value]))
}

/// Handles the Redis BLPOP and BRPOP commands.
///
/// The first listed key holding data is popped right away. Otherwise the call waits
/// on every key at once and takes the first element pushed to any of them. A zero
/// timeout waits forever; an elapsed timeout replies with a null array.
///
/// The emptiness re-check and the registration on each key run under that key's lock,
/// the same lock a push holds while serving waiters, so no push can slip in between.
/// Pops taken here happen under the write-order lock, which is released before
/// waiting.
pub async fn blocking_pop(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
    end: ListEnd,
) -> Result<CommandResult, CommandError> {
    let pop_arguments = BlockingPopArguments::parse(arguments, end)?;
    let order = server.replication.order_writes().await;

    for key in &pop_arguments.keys {
        let popped = server
            .store
            .update_list(key, |stored| stored.and_then(|stored| list::pop_one(stored, end)))?;

        if let Some(value) = popped {
            propagate_pops(server, key, &[end]);
            server.replication.commit(None);
            return Ok(popped_reply(key, value));
        }
    }

    if !session.blocking_allowed {
        return Ok(CommandResult::Response(RespValue::NullArray));
    }

    let (resolver, mut receiver) = Resolver::new();
    let mut registration = Registration::new(&server.list_waiters);

    for key in &pop_arguments.keys {
        let attempt = server.store.update_list(key, |stored| match stored {
            Some(stored) if !stored.is_empty() => match resolver.claim() {
                Some(_) => list::pop_one(stored, end).map_or(Attempt::Registered, Attempt::Popped),
                None => Attempt::AlreadyServed,
            },
            _ => {
                registration.register(key, WaitCondition::Pop(end), &resolver);
                Attempt::Registered
            }
        });

        match attempt {
            Ok(Attempt::Popped(value)) => {
                drop(registration);
                propagate_pops(server, key, &[end]);
                server.replication.commit(None);
                return Ok(popped_reply(key, value));
            }
            Ok(Attempt::Registered) => {}
            Ok(Attempt::AlreadyServed) => break,
            Err(e) => {
                // Still unclaimed means nothing was delivered to us yet.
                if resolver.claim().is_some() {
                    return Err(e.into());
                }
                break;
            }
        }
    }

    drop(order);

    let delivery = match pop_arguments.timeout {
        BlockingTimeout::Forever => receiver.await.ok(),
        BlockingTimeout::After(duration) => {
            match tokio::time::timeout(duration, &mut receiver).await {
                Ok(delivery) => delivery.ok(),
                // A producer that claimed first is mid-delivery: take its element.
                Err(_) => match resolver.claim() {
                    Some(_) => None,
                    None => receiver.await.ok(),
                },
            }
        }
    };

    Ok(match delivery {
        Some((key, value)) => popped_reply(&key, value),
        None => CommandResult::Response(RespValue::NullArray),
    })
}

pub struct BLPop;

impl Command for BLPop {
    fn name(&self) -> &'static str {
        "BLPOP"
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
        Box::pin(blocking_pop(server, session, arguments, ListEnd::Left))
    }
}

pub struct BRPop;

impl Command for BRPop {
    fn name(&self) -> &'static str {
        "BRPOP"
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
        Box::pin(blocking_pop(server, session, arguments, ListEnd::Right))
    }
}
