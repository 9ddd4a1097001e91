//! Command parsing and execution
//!
//! Every command implements the `Command` trait: it checks its own arity and
//! turns raw arguments into a validated `Op`. Ops are plain values, so the
//! same `Op` can run immediately, sit in a transaction queue until EXEC, or
//! be retried by a blocking wait. `executor` is the single place that
//! interprets them against the store.

mod context;
mod registry;
pub mod executor;

// Command implementations
mod string;
mod key;
mod ttl;
mod list;
mod hash;
mod set;
mod admin;
mod transaction;
mod pubsub;

pub use context::{ExecutionContext, QueuedCommand, Subscriber, WatchKey};
pub use registry::CommandRegistry;
pub(crate) use admin::{auth, quit};
pub(crate) use pubsub::apply as apply_pubsub;

use crate::error::CommandError;
use crate::store::{Position, Side};
use bytes::Bytes;
use std::time::Duration;

/// Command parsing trait
///
/// Implementations are stateless and registered once in the `CommandRegistry`.
pub trait Command: Send + Sync {
    /// Get the command name (upper case, used as the registry key)
    fn name(&self) -> &'static str;

    /// Get the minimum number of arguments required
    fn min_args(&self) -> usize {
        0
    }

    /// Get the maximum number of arguments (None = unlimited)
    fn max_args(&self) -> Option<usize> {
        None
    }

    /// Validate the arguments (excluding the command name) into an `Op`
    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError>;

    /// Check arity, then parse
    fn prepare(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        let too_many = self.max_args().map_or(false, |max| args.len() > max);
        if args.len() < self.min_args() || too_many {
            return Err(CommandError::ArgumentCount(self.name().to_string()));
        }
        self.parse(args)
    }
}

/// A validated command, ready to run
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // connection
    Ping(Option<Bytes>),
    Echo(Bytes),
    Select(usize),
    Auth(Bytes),
    Quit,

    // server
    DbSize,
    FlushDb,

    // keys
    Del(Vec<Bytes>),
    Exists(Vec<Bytes>),
    Type(Bytes),
    Expire { key: Bytes, seconds: i64 },
    Ttl(Bytes),
    Persist(Bytes),

    // strings
    Get(Bytes),
    Set { key: Bytes, value: Bytes },

    // hashes
    HSet { key: Bytes, pairs: Vec<(Bytes, Bytes)> },
    HGet { key: Bytes, field: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },

    // sets
    SAdd { key: Bytes, members: Vec<Bytes> },
    SMembers(Bytes),
    SIsMember { key: Bytes, member: Bytes },

    // lists
    Push { key: Bytes, side: Side, values: Vec<Bytes> },
    Pop { key: Bytes, side: Side },
    LLen(Bytes),
    LIndex { key: Bytes, index: i64 },
    LInsert { key: Bytes, position: Position, pivot: Bytes, value: Bytes },
    LRange { key: Bytes, start: i64, stop: i64 },
    BlockingPop { keys: Vec<Bytes>, side: Side, timeout: Option<Duration> },
    BRPopLPush { source: Bytes, destination: Bytes, timeout: Option<Duration> },

    // transactions
    Multi,
    Exec,
    Discard,
    Watch(Vec<Bytes>),
    Unwatch,

    // pub/sub registration
    Subscribe(Vec<Bytes>),
    Unsubscribe(Vec<Bytes>),
    PSubscribe(Vec<Bytes>),
    PUnsubscribe(Vec<Bytes>),
}

/// How the dispatcher routes an `Op`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// MULTI/EXEC/DISCARD/WATCH/UNWATCH
    Transaction,

    /// Subscription bookkeeping, never queued
    PubSub,

    /// AUTH/QUIT, handled on the connection, never queued
    Connection,

    /// May suspend the connection until the store changes
    Blocking,

    /// Runs under the global lock, or is queued inside MULTI
    Keyspace,
}

impl Op {
    /// Routing class of this op
    pub fn class(&self) -> OpClass {
        match self {
            Op::Multi | Op::Exec | Op::Discard | Op::Watch(_) | Op::Unwatch => OpClass::Transaction,
            Op::Subscribe(_) | Op::Unsubscribe(_) | Op::PSubscribe(_) | Op::PUnsubscribe(_) => {
                OpClass::PubSub
            }
            Op::Auth(_) | Op::Quit => OpClass::Connection,
            Op::BlockingPop { .. } | Op::BRPopLPush { .. } => OpClass::Blocking,
            _ => OpClass::Keyspace,
        }
    }

    /// Wait bound of a blocking op; None means forever (or not blocking)
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Op::BlockingPop { timeout, .. } | Op::BRPopLPush { timeout, .. } => *timeout,
            _ => None,
        }
    }
}

/// Commands a connection in subscribed mode may still issue
pub(crate) fn allowed_while_subscribed(name: &str) -> bool {
    matches!(
        name,
        "SUBSCRIBE" | "UNSUBSCRIBE" | "PSUBSCRIBE" | "PUNSUBSCRIBE" | "PING" | "QUIT"
    )
}

/// Parse a strict base-10 integer argument
///
/// Rejects an explicit '+' sign and negative zero ("-0"), which `str::parse`
/// would accept.
pub(crate) fn parse_int(arg: &Bytes) -> Result<i64, CommandError> {
    let s = std::str::from_utf8(arg).map_err(|_| CommandError::InvalidInteger)?;
    if s.starts_with('+') {
        return Err(CommandError::InvalidInteger);
    }
    let n = s.parse::<i64>().map_err(|_| CommandError::InvalidInteger)?;
    if n == 0 && s.starts_with('-') {
        return Err(CommandError::InvalidInteger);
    }
    Ok(n)
}

/// Parse a blocking timeout in seconds; 0 means wait forever
pub(crate) fn parse_timeout(arg: &Bytes) -> Result<Option<Duration>, CommandError> {
    let seconds = parse_int(arg)?;
    if seconds < 0 {
        return Err(CommandError::NegativeTimeout);
    }
    if seconds == 0 {
        return Ok(None);
    }
    // Must still fit in milliseconds
    if seconds.checked_mul(1000).is_none() {
        return Err(CommandError::TimeoutOutOfRange);
    }
    Ok(Some(Duration::from_secs(seconds as u64)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(&Bytes::from("42")), Ok(42));
        assert_eq!(parse_int(&Bytes::from("-7")), Ok(-7));
        assert_eq!(parse_int(&Bytes::from("0")), Ok(0));
        assert_eq!(parse_int(&Bytes::from("-0")), Err(CommandError::InvalidInteger));
        assert_eq!(parse_int(&Bytes::from("+1")), Err(CommandError::InvalidInteger));
        assert_eq!(parse_int(&Bytes::from("1.5")), Err(CommandError::InvalidInteger));
        assert_eq!(parse_int(&Bytes::from("")), Err(CommandError::InvalidInteger));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(&Bytes::from("0")), Ok(None));
        assert_eq!(parse_timeout(&Bytes::from("3")), Ok(Some(Duration::from_secs(3))));
        assert_eq!(parse_timeout(&Bytes::from("-1")), Err(CommandError::NegativeTimeout));
        assert_eq!(parse_timeout(&Bytes::from("-0")), Err(CommandError::InvalidInteger));
        assert_eq!(parse_timeout(&Bytes::from("soon")), Err(CommandError::InvalidInteger));
        assert_eq!(
            parse_timeout(&Bytes::from("9223372036854775807")),
            Err(CommandError::TimeoutOutOfRange)
        );
        assert_eq!(
            parse_timeout(&Bytes::from("9223372036854775")),
            Ok(Some(Duration::from_secs(9_223_372_036_854_775)))
        );
    }

    #[test]
    fn test_op_class() {
        assert_eq!(Op::Multi.class(), OpClass::Transaction);
        assert_eq!(Op::Quit.class(), OpClass::Connection);
        assert_eq!(Op::Get(Bytes::from("k")).class(), OpClass::Keyspace);
        let op = Op::BlockingPop {
            keys: vec![Bytes::from("k")],
            side: Side::Left,
            timeout: Some(Duration::from_secs(1)),
        };
        assert_eq!(op.class(), OpClass::Blocking);
        assert_eq!(op.timeout(), Some(Duration::from_secs(1)));
    }
}
