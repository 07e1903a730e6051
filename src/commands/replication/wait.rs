use std::time::Duration;

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::{RedisRole, RedisServer},
};

#[derive(Debug, PartialEq)]
pub struct WaitArguments {
    replicas: usize,
    /// `None` waits forever.
    timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [replicas, timeout] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("wait".to_string()));
        };

        let replicas = replicas
            .parse::<usize>()
            .map_err(|_| CommandError::NotAnInteger)?;

        let timeout = match timeout.parse::<u64>() {
            Ok(0) => None,
            Ok(milliseconds) => Some(Duration::from_millis(milliseconds)),
            Err(_) => return Err(CommandError::InvalidTimeout),
        };

        Ok(Self { replicas, timeout })
    }
}

/// Handles `WAIT <numreplicas> <timeout-ms>`.
///
/// Replies with the number of replicas that have acknowledged every write sent to
/// them, as soon as that reaches `numreplicas` or when the timeout elapses. Inside a
/// transaction the current count is returned without waiting.
pub async fn wait(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    if server.config.role != RedisRole::Master {
        return Err(CommandError::WaitOnReplica);
    }

    let count = if session.blocking_allowed {
        server
            .replication
            .wait_for_acknowledgments(wait_arguments.replicas, wait_arguments.timeout)
            .await
    } else {
        server.replication.acknowledged_count()
    };

    Ok(CommandResult::Response(RespValue::Integer(count as i64)))
}

pub struct Wait;

impl Command for Wait {
    fn name(&self) -> &'static str {
        "WAIT"
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
        Box::pin(wait(server, session, arguments))
    }
}
