//! Per-connection MULTI/EXEC queues.

use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use crate::{commands::CommandHandler, connection::ConnectionId};

#[derive(Error, Debug, PartialEq, Clone)]
pub enum TransactionError {
    #[error("MULTI calls can not be nested")]
    Nested,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
}

/// Open transactions keyed by connection. A connection has a queue only between
/// MULTI and the EXEC or DISCARD that closes it.
#[derive(Default)]
pub struct TransactionManager {
    queues: DashMap<ConnectionId, Vec<CommandHandler>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an empty queue. A second MULTI is rejected and the open queue is kept.
    pub fn begin(&self, connection: ConnectionId) -> Result<(), TransactionError> {
        match self.queues.entry(connection) {
            Entry::Occupied(_) => Err(TransactionError::Nested),
            Entry::Vacant(vacant) => {
                vacant.insert(Vec::new());
                Ok(())
            }
        }
    }

    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.queues.contains_key(&connection)
    }

    /// Captures `command` when a transaction is open, handing it back otherwise.
    pub fn enqueue(
        &self,
        connection: ConnectionId,
        command: CommandHandler,
    ) -> Result<usize, CommandHandler> {
        match self.queues.get_mut(&connection) {
            Some(mut queue) => {
                queue.push(command);
                Ok(queue.len())
            }
            None => Err(command),
        }
    }

    /// Closes the transaction, returning the captured commands in arrival order.
    pub fn take(&self, connection: ConnectionId) -> Result<Vec<CommandHandler>, TransactionError> {
        self.queues
            .remove(&connection)
            .map(|(_, queue)| queue)
            .ok_or(TransactionError::ExecWithoutMulti)
    }

    pub fn discard(&self, connection: ConnectionId) -> Result<(), TransactionError> {
        self.queues
            .remove(&connection)
            .map(|_| ())
            .ok_or(TransactionError::DiscardWithoutMulti)
    }
}
