use jiff::{SignedDuration, Timestamp};

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{DataType, Value},
    resp::RespValue,
    server::RedisServer,
};

/// Represents the parsed arguments for the SET command
#[derive(Debug, PartialEq)]
pub struct SetArguments {
    key: String,
    value: String,
    /// How long the key lives, when PX or EX was given
    time_to_live: Option<SignedDuration>,
}

impl SetArguments {
    /// Accepts `key value`, optionally followed by `PX <milliseconds>` or
    /// `EX <seconds>` (case-insensitive). The duration must be positive.
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let (key, value, option) = match arguments {
            [key, value] => (key, value, None),
            [key, value, unit, amount] => (key, value, Some((unit, amount))),
            [_, _, ..] => return Err(CommandError::SyntaxError),
            _ => return Err(CommandError::WrongNumberOfArguments("set".to_string())),
        };

        let time_to_live = match option {
            None => None,
            Some((unit, amount)) => {
                let amount = amount
                    .parse::<i64>()
                    .map_err(|_| CommandError::NotAnInteger)?;

                if amount <= 0 {
                    return Err(CommandError::InvalidExpireTime("set".to_string()));
                }

                match unit.to_uppercase().as_str() {
                    "PX" => Some(SignedDuration::from_millis(amount)),
                    "EX" => Some(SignedDuration::from_secs(amount)),
                    _ => return Err(CommandError::SyntaxError),
                }
            }
        };

        Ok(Self {
            key: key.clone(),
            value: value.clone(),
            time_to_live,
        })
    }
}

/// Handles the Redis SET command.
///
/// Replaces whatever the key held, of any kind, and sets or clears its expiry.
pub fn set(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let expiration = set_arguments
        .time_to_live
        .map(|time_to_live| Timestamp::now().checked_add(time_to_live))
        .transpose()
        .map_err(|_| CommandError::InvalidExpireTime("set".to_string()))?;

    server.store.insert(
        set_arguments.key,
        Value::with_expiration(DataType::String(set_arguments.value), expiration),
    );

    Ok(CommandResult::Response(RespValue::SimpleString(
        "OK".to_string(),
    )))
}

pub struct Set;

impl Command for Set {
    fn name(&self) -> &'static str {
        "SET"
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
        Box::pin(async move { set(server, arguments) })
    }
}
