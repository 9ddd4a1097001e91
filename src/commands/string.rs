//! String commands (SET, GET)

use super::{Command, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Keyspace;
use bytes::Bytes;

/// SET command - Set a key to a value
///
/// Syntax: SET key value
pub struct SetCommand;

impl Command for SetCommand {
    fn name(&self) -> &'static str {
        "SET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Set {
            key: args[0].clone(),
            value: args[1].clone(),
        })
    }
}

/// GET command - Get the value of a key
///
/// Syntax: GET key
pub struct GetCommand;

impl Command for GetCommand {
    fn name(&self) -> &'static str {
        "GET"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Get(args[0].clone()))
    }
}

/// SET overwrites whatever type the key held and clears its TTL
pub(super) fn set(db: &mut Keyspace, key: &Bytes, value: &Bytes) -> RespValue {
    db.set_string(key, value.clone());
    RespValue::ok()
}

pub(super) fn get(db: &mut Keyspace, key: &Bytes) -> Result<RespValue, CommandError> {
    Ok(match db.get_string(key)? {
        Some(value) => RespValue::bulk_string(value.clone()),
        None => RespValue::null(),
    })
}
