use thiserror::Error;

use crate::{
    key_value_store::{StoreError, StreamIdError},
    resp::RespValue,
    transactions::TransactionError,
};

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(String),
    #[error("syntax error")]
    SyntaxError,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("value is not a valid float")]
    NotAFloat,
    #[error("timeout is not a float or out of range")]
    InvalidTimeout,
    #[error("invalid expire time in '{0}' command")]
    InvalidExpireTime(String),
    #[error("invalid longitude,latitude pair {0:.6},{1:.6}")]
    InvalidCoordinates(f64, f64),
    #[error("unsupported unit provided. please use M, KM, FT, MI")]
    UnsupportedUnit,
    #[error("could not decode requested zset member")]
    MemberNotFound,
    #[error("invalid pattern '{0}'")]
    InvalidPattern(String),
    #[error("{0}")]
    InvalidStreamId(#[from] StreamIdError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Transaction(#[from] TransactionError),
    #[error(
        "Can't execute '{0}': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context"
    )]
    NotAllowedWhileSubscribed(String),
    #[error("READONLY You can't write against a read only replica.")]
    ReadOnlyReplica,
    #[error("WAIT cannot be used with replica instances")]
    WaitOnReplica,
    #[error("PSYNC can only be served by a master")]
    PsyncOnReplica,
    #[error("unrecognized REPLCONF option '{0}'")]
    InvalidReplconfOption(String),
}

impl CommandError {
    pub fn as_resp(&self) -> RespValue {
        match self {
            CommandError::Store(StoreError::WrongType) | CommandError::ReadOnlyReplica => {
                RespValue::Error(self.to_string())
            }
            _ => RespValue::Error(format!("ERR {}", self)),
        }
    }

    pub fn as_string(&self) -> String {
        self.as_resp().encode()
    }
}
