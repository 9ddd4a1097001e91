//! Error types
//!
//! `CommandError` covers everything a client can be told about a failed
//! command. `RegistryError` is startup-only and never reaches a client.

use crate::protocol::RespValue;
use std::fmt;

/// Client-facing command errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Wrong number of arguments for the named command
    ArgumentCount(String),

    /// Key exists under an incompatible type
    WrongType,

    /// Non-numeric or malformed integer argument
    InvalidInteger,

    /// Blocking timeout below zero
    NegativeTimeout,

    /// Blocking timeout too large to turn into a deadline
    TimeoutOutOfRange,

    /// Expire time too large for the named command
    InvalidExpireTime(String),

    /// Malformed option (e.g. LINSERT neither BEFORE nor AFTER)
    Syntax,

    /// No handler registered under this name
    UnknownCommand(String),

    /// SELECT past the configured number of databases
    DbIndexOutOfRange,

    /// MULTI while already queuing
    NestedMulti,

    /// WATCH while queuing
    WatchInTx,

    /// DISCARD outside a transaction
    DiscardWithoutMulti,

    /// EXEC outside a transaction
    ExecWithoutMulti,

    /// EXEC from a nested (script) call
    NestedExec,

    /// Transaction or subscription commands from a nested call
    NotFromScript,

    /// EXEC of a transaction marked dirty while queuing
    TransactionAbort,

    /// Command that cannot be queued inside MULTI
    NotAllowedInTx,

    /// Command issued while the connection is in subscribed mode
    SubscribedContext,

    /// AUTH with the wrong password
    InvalidPassword,

    /// AUTH without any configured password
    NoPasswordSet,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::ArgumentCount(cmd) => {
                write!(f, "ERR wrong number of arguments for '{}' command", cmd.to_lowercase())
            }
            CommandError::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
            CommandError::InvalidInteger => write!(f, "ERR value is not an integer or out of range"),
            CommandError::NegativeTimeout => write!(f, "ERR timeout is negative"),
            CommandError::TimeoutOutOfRange => write!(f, "ERR timeout is out of range"),
            CommandError::InvalidExpireTime(cmd) => {
                write!(f, "ERR invalid expire time in '{}' command", cmd.to_lowercase())
            }
            CommandError::Syntax => write!(f, "ERR syntax error"),
            CommandError::UnknownCommand(cmd) => write!(f, "ERR unknown command '{}'", cmd),
            CommandError::DbIndexOutOfRange => write!(f, "ERR DB index is out of range"),
            CommandError::NestedMulti => write!(f, "ERR MULTI calls can not be nested"),
            CommandError::WatchInTx => write!(f, "ERR WATCH inside MULTI is not allowed"),
            CommandError::DiscardWithoutMulti => write!(f, "ERR DISCARD without MULTI"),
            CommandError::ExecWithoutMulti => write!(f, "ERR EXEC without MULTI"),
            CommandError::NestedExec => write!(f, "ERR EXEC not allowed from scripts"),
            CommandError::NotFromScript => write!(f, "ERR This command is not allowed from scripts"),
            CommandError::TransactionAbort => {
                write!(f, "EXECABORT Transaction discarded because of previous errors.")
            }
            CommandError::NotAllowedInTx => write!(f, "ERR Command not allowed inside a transaction"),
            CommandError::SubscribedContext => write!(
                f,
                "ERR only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context"
            ),
            CommandError::InvalidPassword => write!(f, "WRONGPASS invalid password"),
            CommandError::NoPasswordSet => {
                write!(f, "ERR AUTH called without any password configured")
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl From<CommandError> for RespValue {
    fn from(err: CommandError) -> Self {
        RespValue::error(err.to_string())
    }
}

/// Errors raised while building the command table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The (upper-cased) name is already bound to a handler
    Conflict(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Conflict(name) => write!(f, "command already registered: {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}
