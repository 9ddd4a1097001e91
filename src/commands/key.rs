//! Key commands (DEL, EXISTS, TYPE)

use super::{Command, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Keyspace;
use bytes::Bytes;

/// DEL command - Delete one or more keys
///
/// Syntax: DEL key [key ...]
pub struct DelCommand;

impl Command for DelCommand {
    fn name(&self) -> &'static str {
        "DEL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Del(args.to_vec()))
    }
}

/// EXISTS command - Count how many of the given keys exist
///
/// Syntax: EXISTS key [key ...]
pub struct ExistsCommand;

impl Command for ExistsCommand {
    fn name(&self) -> &'static str {
        "EXISTS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Exists(args.to_vec()))
    }
}

/// TYPE command - Name the type of the value stored at a key
///
/// Syntax: TYPE key
pub struct TypeCommand;

impl Command for TypeCommand {
    fn name(&self) -> &'static str {
        "TYPE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Type(args[0].clone()))
    }
}

pub(super) fn del(db: &mut Keyspace, keys: &[Bytes]) -> RespValue {
    let deleted = keys.iter().filter(|key| db.delete(key, true)).count();
    RespValue::integer(deleted as i64)
}

/// Repeated keys count once per occurrence
pub(super) fn exists(db: &mut Keyspace, keys: &[Bytes]) -> RespValue {
    let found = keys.iter().filter(|key| db.exists(key)).count();
    RespValue::integer(found as i64)
}

pub(super) fn key_type(db: &mut Keyspace, key: &Bytes) -> RespValue {
    match db.key_type(key) {
        Some(kind) => RespValue::simple_string(kind.type_name()),
        None => RespValue::simple_string("none"),
    }
}
