//! Set commands (SADD, SMEMBERS, SISMEMBER)

use super::{Command, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Keyspace;
use bytes::Bytes;

/// SADD command - Add one or more members to a set
///
/// Syntax: SADD key member [member ...]
pub struct SAddCommand;

impl Command for SAddCommand {
    fn name(&self) -> &'static str {
        "SADD"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::SAdd {
            key: args[0].clone(),
            members: args[1..].to_vec(),
        })
    }
}

/// SMEMBERS command - Get all the members in a set
///
/// Syntax: SMEMBERS key
pub struct SMembersCommand;

impl Command for SMembersCommand {
    fn name(&self) -> &'static str {
        "SMEMBERS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::SMembers(args[0].clone()))
    }
}

/// SISMEMBER command - Check if a value is a member of a set
///
/// Syntax: SISMEMBER key member
pub struct SIsMemberCommand;

impl Command for SIsMemberCommand {
    fn name(&self) -> &'static str {
        "SISMEMBER"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::SIsMember {
            key: args[0].clone(),
            member: args[1].clone(),
        })
    }
}

pub(super) fn sadd(db: &mut Keyspace, key: &Bytes, members: &[Bytes]) -> Result<RespValue, CommandError> {
    let added = db.sadd(key, members)?;
    Ok(RespValue::integer(added as i64))
}

pub(super) fn smembers(db: &mut Keyspace, key: &Bytes) -> Result<RespValue, CommandError> {
    Ok(RespValue::bulk_array(db.smembers(key)?))
}

pub(super) fn sismember(db: &mut Keyspace, key: &Bytes, member: &Bytes) -> Result<RespValue, CommandError> {
    Ok(RespValue::integer(db.sismember(key, member)? as i64))
}
