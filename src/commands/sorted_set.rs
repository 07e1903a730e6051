//! ZADD, ZRANK, ZSCORE, ZCARD, ZRANGE and ZREM.

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

pub struct ZAddArguments {
    key: String,
    members: Vec<(f64, String)>,
}

impl ZAddArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, pairs @ ..] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("zadd".to_string()));
        };

        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("zadd".to_string()));
        }

        let members = pairs
            .chunks_exact(2)
            .map(|pair| -> Result<(f64, String), CommandError> {
                let score = pair[0]
                    .parse::<f64>()
                    .ok()
                    .filter(|score| !score.is_nan())
                    .ok_or(CommandError::NotAFloat)?;

                Ok((score, pair[1].clone()))
            })
            .collect::<Result<Vec<_>, CommandError>>()?;

        Ok(Self {
            key: key.clone(),
            members,
        })
    }
}

/// Returns how many members were newly added; updated scores do not count.
pub fn zadd(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let zadd_arguments = ZAddArguments::parse(arguments)?;

    let added = server.store.upsert_sorted_set(&zadd_arguments.key, |set| {
        zadd_arguments
            .members
            .into_iter()
            .filter(|(score, member)| set.insert(member.clone(), *score))
            .count()
    })?;

    Ok(CommandResult::Response(RespValue::Integer(added as i64)))
}

fn key_and_member<'a>(
    arguments: &'a [String],
    name: &str,
) -> Result<(&'a str, &'a str), CommandError> {
    match arguments {
        [key, member] => Ok((key.as_str(), member.as_str())),
        _ => Err(CommandError::WrongNumberOfArguments(name.to_string())),
    }
}

pub fn zrank(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let (key, member) = key_and_member(arguments, "zrank")?;

    Ok(CommandResult::Response(
        match server.store.with_sorted_set(key, |set| set.rank(member)).flatten() {
            Some(rank) => RespValue::Integer(rank as i64),
            None => RespValue::NullBulkString,
        },
    ))
}

pub fn zscore(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let (key, member) = key_and_member(arguments, "zscore")?;

    Ok(CommandResult::Response(
        match server.store.with_sorted_set(key, |set| set.score(member)).flatten() {
            Some(score) => RespValue::BulkString(score.to_string()),
            None => RespValue::NullBulkString,
        },
    ))
}

pub fn zcard(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("zcard".to_string()));
    };

    let cardinality = server.store.with_sorted_set(key, |set| set.len()).unwrap_or(0);

    Ok(CommandResult::Response(RespValue::Integer(cardinality as i64)))
}

/// Members between two inclusive ranks, lowest score first. Negative ranks count
/// from the highest.
pub fn zrange(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key, start, stop] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("zrange".to_string()));
    };

    let start = start.parse::<isize>().map_err(|_| CommandError::NotAnInteger)?;
    let stop = stop.parse::<isize>().map_err(|_| CommandError::NotAnInteger)?;

    let members = server
        .store
        .with_sorted_set(key, |set| set.range(start, stop))
        .unwrap_or_default();

    Ok(CommandResult::Response(RespValue::array_from_strings(members)))
}

pub fn zrem(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key, members @ ..] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("zrem".to_string()));
    };

    if members.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("zrem".to_string()));
    }

    let removed = server.store.update_sorted_set(key, |set| {
        set.map_or(0, |set| members.iter().filter(|member| set.remove(member)).count())
    })?;

    Ok(CommandResult::Response(RespValue::Integer(removed as i64)))
}

pub struct ZAdd;

impl Command for ZAdd {
    fn name(&self) -> &'static str {
        "ZADD"
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
        Box::pin(async move { zadd(server, arguments) })
    }
}

pub struct ZRank;

impl Command for ZRank {
    fn name(&self) -> &'static str {
        "ZRANK"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { zrank(server, arguments) })
    }
}

pub struct ZScore;

impl Command for ZScore {
    fn name(&self) -> &'static str {
        "ZSCORE"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { zscore(server, arguments) })
    }
}

pub struct ZCard;

impl Command for ZCard {
    fn name(&self) -> &'static str {
        "ZCARD"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { zcard(server, arguments) })
    }
}

pub struct ZRange;

impl Command for ZRange {
    fn name(&self) -> &'static str {
        "ZRANGE"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { zrange(server, arguments) })
    }
}

pub struct ZRem;

impl Command for ZRem {
    fn name(&self) -> &'static str {
        "ZREM"
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
        Box::pin(async move { zrem(server, arguments) })
    }
}
