use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    server::{RedisRole, RedisServer},
};

/// Handles `PSYNC <replid> <offset>`.
///
/// Partial resynchronization is not supported, so every request, `PSYNC ? -1`
/// included, gets a full resync: `+FULLRESYNC <replid> <offset>` followed by the
/// snapshot framed as `$<len>\r\n<bytes>`. From then on the connection receives every
/// propagated write.
pub fn psync(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if arguments.len() != 2 {
        return Err(CommandError::WrongNumberOfArguments("psync".to_string()));
    }

    if server.config.role != RedisRole::Master {
        return Err(CommandError::PsyncOnReplica);
    }

    server.replication.attach_replica(
        session.id,
        &session.address,
        session.outbound.clone(),
        &server.empty_snapshot,
    );

    Ok(CommandResult::AlreadyStreamed)
}

pub struct Psync;

impl Command for Psync {
    fn name(&self) -> &'static str {
        "PSYNC"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { psync(server, session, arguments) })
    }
}
