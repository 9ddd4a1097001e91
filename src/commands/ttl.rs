//! TTL commands (EXPIRE, TTL, PERSIST)

use super::{parse_int, Command, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Keyspace;
use bytes::Bytes;
use std::time::Duration;

/// EXPIRE command - Set a timeout on a key
///
/// Syntax: EXPIRE key seconds
pub struct ExpireCommand;

impl Command for ExpireCommand {
    fn name(&self) -> &'static str {
        "EXPIRE"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        let seconds = parse_int(&args[1])?;
        if seconds.checked_mul(1000).is_none() {
            return Err(CommandError::InvalidExpireTime(self.name().to_string()));
        }
        Ok(Op::Expire {
            key: args[0].clone(),
            seconds,
        })
    }
}

/// TTL command - Get the time to live for a key
///
/// Syntax: TTL key
pub struct TtlCommand;

impl Command for TtlCommand {
    fn name(&self) -> &'static str {
        "TTL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Ttl(args[0].clone()))
    }
}

/// PERSIST command - Remove the timeout of a key
///
/// Syntax: PERSIST key
pub struct PersistCommand;

impl Command for PersistCommand {
    fn name(&self) -> &'static str {
        "PERSIST"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Persist(args[0].clone()))
    }
}

/// A non-positive TTL deletes the key right away
pub(super) fn expire(db: &mut Keyspace, key: &Bytes, seconds: i64) -> RespValue {
    let applied = if seconds <= 0 {
        db.delete(key, true)
    } else {
        db.expire(key, Duration::from_secs(seconds as u64))
    };
    RespValue::integer(applied as i64)
}

/// -2 if the key is absent, -1 if it has no TTL, else whole seconds (rounded)
pub(super) fn ttl(db: &mut Keyspace, key: &Bytes) -> RespValue {
    match db.ttl(key) {
        None => RespValue::integer(-2),
        Some(None) => RespValue::integer(-1),
        Some(Some(left)) => RespValue::integer(((left.as_millis() + 500) / 1000) as i64),
    }
}

pub(super) fn persist(db: &mut Keyspace, key: &Bytes) -> RespValue {
    RespValue::integer(db.persist(key) as i64)
}
