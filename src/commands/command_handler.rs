use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;

use crate::{
    commands::{
        blpop::{BLPop, BRPop},
        command_error::CommandError,
        config_get::ConfigGet,
        echo::Echo,
        geo::{GeoAdd, GeoDist, GeoPos, GeoSearch},
        get::Get,
        incr::Incr,
        info::Info,
        keys::Keys,
        llen::LLen,
        lpop::{LPop, RPop},
        lrange::LRange,
        ping::Ping,
        pub_sub::{Publish, Subscribe, Unsubscribe},
        replication::{Psync, Replconf, ReplconfAck, ReplconfGetAck, Wait},
        rpush_and_lpush::{LPush, RPush},
        set::Set,
        sorted_set::{ZAdd, ZCard, ZRange, ZRank, ZRem, ZScore},
        transactions::{Discard, Exec, Multi},
        type_command::Type,
        xadd::XAdd,
        xrange::XRange,
        xread::XRead,
    },
    connection::{Origin, Session},
    resp::RespValue,
    server::{RedisRole, RedisServer},
};

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Response(RespValue),
    NoResponse,
    /// The command already wrote its output through the session.
    AlreadyStreamed,
}

pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandResult, CommandError>> + Send + 'a>>;

pub trait Command: Send + Sync {
    /// Uppercase name, including the subcommand for composite commands.
    fn name(&self) -> &'static str;

    /// Writes are propagated to replicas and refused on a replica's client connections.
    fn is_write(&self) -> bool {
        false
    }

    /// May suspend until another connection acts, so the caller watches for hangups.
    fn is_blocking(&self) -> bool {
        false
    }

    /// MULTI, EXEC and DISCARD run immediately even inside a transaction.
    fn is_transaction_control(&self) -> bool {
        false
    }

    fn allowed_while_subscribed(&self) -> bool {
        false
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a>;
}

/// Dispatch table from uppercase command name to implementation.
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(Ping),
            Arc::new(Echo),
            Arc::new(Get),
            Arc::new(Set),
            Arc::new(Incr),
            Arc::new(Type),
            Arc::new(Keys),
            Arc::new(ConfigGet),
            Arc::new(Info),
            Arc::new(RPush),
            Arc::new(LPush),
            Arc::new(LPop),
            Arc::new(RPop),
            Arc::new(LLen),
            Arc::new(LRange),
            Arc::new(BLPop),
            Arc::new(BRPop),
            Arc::new(XAdd),
            Arc::new(XRange),
            Arc::new(XRead),
            Arc::new(ZAdd),
            Arc::new(ZRank),
            Arc::new(ZScore),
            Arc::new(ZCard),
            Arc::new(ZRange),
            Arc::new(ZRem),
            Arc::new(GeoAdd),
            Arc::new(GeoPos),
            Arc::new(GeoDist),
            Arc::new(GeoSearch),
            Arc::new(Multi),
            Arc::new(Exec),
            Arc::new(Discard),
            Arc::new(Replconf),
            Arc::new(ReplconfAck),
            Arc::new(ReplconfGetAck),
            Arc::new(Psync),
            Arc::new(Wait),
            Arc::new(Subscribe),
            Arc::new(Unsubscribe),
            Arc::new(Publish),
        ];

        Self {
            commands: commands
                .into_iter()
                .map(|command| (command.name(), command))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

/// One decoded invocation: the resolved command, its arguments and the exact request
/// bytes it arrived as.
#[derive(Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
    pub raw: Bytes,
    command: Arc<dyn Command>,
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandler")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl CommandHandler {
    /// Resolves the command name. When the second item together with the first names
    /// a registered command (`CONFIG GET`, `REPLCONF ACK`), both are consumed.
    pub fn new(
        registry: &CommandRegistry,
        items: Vec<String>,
        raw: Bytes,
    ) -> Result<Self, CommandError> {
        let mut items = items.into_iter();

        let Some(first) = items.next() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };

        let rest = items.collect::<Vec<_>>();
        let name = first.to_uppercase();

        let (name, arguments) = match rest.split_first() {
            Some((sub_command, arguments))
                if registry.contains(&format!("{} {}", name, sub_command.to_uppercase())) =>
            {
                (
                    format!("{} {}", name, sub_command.to_uppercase()),
                    arguments.to_vec(),
                )
            }
            _ => (name, rest),
        };

        let command = registry
            .get(&name)
            .ok_or(CommandError::UnknownCommand(first))?;

        Ok(Self {
            name,
            arguments,
            raw,
            command,
        })
    }

    pub fn is_blocking(&self) -> bool {
        self.command.is_blocking()
    }

    /// Session-level handling: subscribed-mode filtering and transaction capture,
    /// then [`CommandHandler::execute`]. Errors become RESP error replies.
    pub async fn handle(self, server: &RedisServer, session: &Session) -> CommandResult {
        if server.channels.is_subscribed(session.id) && !self.command.allowed_while_subscribed() {
            return CommandResult::Response(
                CommandError::NotAllowedWhileSubscribed(self.name.to_lowercase()).as_resp(),
            );
        }

        let handler = if self.command.is_transaction_control() {
            self
        } else {
            match server.transactions.enqueue(session.id, self) {
                Ok(_) => {
                    return CommandResult::Response(RespValue::SimpleString(
                        "QUEUED".to_string(),
                    ))
                }
                Err(handler) => handler,
            }
        };

        match handler.execute(server, session).await {
            Ok(result) => result,
            Err(e) => CommandResult::Response(e.as_resp()),
        }
    }

    /// The execution contract shared by client connections, the master link and
    /// EXEC: writes are refused on replica client connections. On a master a write
    /// runs under the write-order lock and is broadcast only once it has succeeded,
    /// followed by whatever frames it queued while running.
    pub async fn execute(
        &self,
        server: &RedisServer,
        session: &Session,
    ) -> Result<CommandResult, CommandError> {
        if !self.command.is_write() {
            return self.command.execute(server, session, &self.arguments).await;
        }

        match (&server.config.role, session.origin) {
            (RedisRole::Replica { .. }, Origin::Client) => Err(CommandError::ReadOnlyReplica),
            (RedisRole::Replica { .. }, Origin::Master) => {
                self.command.execute(server, session, &self.arguments).await
            }
            (RedisRole::Master, _) => {
                let _order = server.replication.order_writes().await;
                let result = self.command.execute(server, session, &self.arguments).await;

                match result {
                    Ok(_) => {
                        server.replication.commit(Some(&self.raw));
                    }
                    Err(_) => server.replication.abandon(),
                }

                result
            }
        }
    }
}
