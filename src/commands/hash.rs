//! Hash commands (HSET, HGET, HDEL)

use super::{Command, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Keyspace;
use bytes::Bytes;

/// HSET command - Set field in the hash stored at key to value
///
/// Syntax: HSET key field value [field value ...]
pub struct HSetCommand;

impl Command for HSetCommand {
    fn name(&self) -> &'static str {
        "HSET"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        // field/value pairs only
        if (args.len() - 1) % 2 != 0 {
            return Err(CommandError::ArgumentCount(self.name().to_string()));
        }

        let pairs = args[1..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Ok(Op::HSet {
            key: args[0].clone(),
            pairs,
        })
    }
}

/// HGET command - Get the value of a hash field
///
/// Syntax: HGET key field
pub struct HGetCommand;

impl Command for HGetCommand {
    fn name(&self) -> &'static str {
        "HGET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::HGet {
            key: args[0].clone(),
            field: args[1].clone(),
        })
    }
}

/// HDEL command - Delete one or more hash fields
///
/// Syntax: HDEL key field [field ...]
pub struct HDelCommand;

impl Command for HDelCommand {
    fn name(&self) -> &'static str {
        "HDEL"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::HDel {
            key: args[0].clone(),
            fields: args[1..].to_vec(),
        })
    }
}

pub(super) fn hset(db: &mut Keyspace, key: &Bytes, pairs: &[(Bytes, Bytes)]) -> Result<RespValue, CommandError> {
    let added = db.hset(key, pairs)?;
    Ok(RespValue::integer(added as i64))
}

pub(super) fn hget(db: &mut Keyspace, key: &Bytes, field: &Bytes) -> Result<RespValue, CommandError> {
    Ok(match db.hget(key, field)? {
        Some(value) => RespValue::bulk_string(value.clone()),
        None => RespValue::null(),
    })
}

pub(super) fn hdel(db: &mut Keyspace, key: &Bytes, fields: &[Bytes]) -> Result<RespValue, CommandError> {
    let removed = db.hdel(key, fields)?;
    Ok(RespValue::integer(removed as i64))
}
