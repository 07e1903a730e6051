use tracing::debug;

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    resp::RespValue,
    server::RedisServer,
};

/// Handles the Redis EXEC command.
///
/// Runs the queued commands in the order they arrived. Each one goes through
/// [`crate::commands::CommandHandler::execute`], so writes are propagated one by one
/// exactly as if they had been sent outside the transaction. Blocking commands do not
/// block here.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - An array with one reply per queued command; a
///   command that failed contributes its error reply without aborting the rest
/// * `Err(CommandError::Transaction)` - If no transaction is open
pub async fn exec(
    server: &RedisServer,
    session: &Session,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("exec".to_string()));
    }

    let queued = server.transactions.take(session.id)?;
    let transaction_session = session.for_transaction();

    debug!(connection = ?session.id, commands = queued.len(), "Executing transaction");

    let mut replies = Vec::with_capacity(queued.len());

    for handler in queued {
        let reply = match handler.execute(server, &transaction_session).await {
            Ok(CommandResult::Response(reply)) => reply,
            Ok(CommandResult::NoResponse | CommandResult::AlreadyStreamed) => {
                RespValue::NullBulkString
            }
            Err(e) => e.as_resp(),
        };

        replies.push(reply);
    }

    Ok(CommandResult::Response(RespValue::Array(replies)))
}

pub struct Exec;

impl Command for Exec {
    fn name(&self) -> &'static str {
        "EXEC"
    }

    fn is_transaction_control(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(exec(server, session, arguments))
    }
}
