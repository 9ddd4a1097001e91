//! List commands (LPUSH, RPUSH, LPOP, RPOP, LLEN, LINDEX, LINSERT, LRANGE,
//! BLPOP, BRPOP, BRPOPLPUSH)

use super::{parse_int, parse_timeout, Command, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::{KeyType, Keyspace, Position, Side};
use bytes::Bytes;

/// LPUSH/RPUSH command - Add one or multiple values to one end of a list
///
/// Syntax: LPUSH key value [value ...]
pub struct PushCommand {
    pub side: Side,
}

impl Command for PushCommand {
    fn name(&self) -> &'static str {
        match self.side {
            Side::Left => "LPUSH",
            Side::Right => "RPUSH",
        }
    }

    fn min_args(&self) -> usize {
        2
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Push {
            key: args[0].clone(),
            side: self.side,
            values: args[1..].to_vec(),
        })
    }
}

/// LPOP/RPOP command - Remove and get the element at one end of a list
///
/// Syntax: LPOP key
pub struct PopCommand {
    pub side: Side,
}

impl Command for PopCommand {
    fn name(&self) -> &'static str {
        match self.side {
            Side::Left => "LPOP",
            Side::Right => "RPOP",
        }
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Pop {
            key: args[0].clone(),
            side: self.side,
        })
    }
}

/// LLEN command - Get the length of a list
///
/// Syntax: LLEN key
pub struct LLenCommand;

impl Command for LLenCommand {
    fn name(&self) -> &'static str {
        "LLEN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::LLen(args[0].clone()))
    }
}

/// LINDEX command - Get an element from a list by its index
///
/// Syntax: LINDEX key index
pub struct LIndexCommand;

impl Command for LIndexCommand {
    fn name(&self) -> &'static str {
        "LINDEX"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::LIndex {
            key: args[0].clone(),
            index: parse_int(&args[1])?,
        })
    }
}

/// LINSERT command - Insert an element before or after another element
///
/// Syntax: LINSERT key BEFORE|AFTER pivot element
pub struct LInsertCommand;

impl Command for LInsertCommand {
    fn name(&self) -> &'static str {
        "LINSERT"
    }

    fn min_args(&self) -> usize {
        4
    }

    fn max_args(&self) -> Option<usize> {
        Some(4)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        let position = if args[1].eq_ignore_ascii_case(b"BEFORE") {
            Position::Before
        } else if args[1].eq_ignore_ascii_case(b"AFTER") {
            Position::After
        } else {
            return Err(CommandError::Syntax);
        };

        Ok(Op::LInsert {
            key: args[0].clone(),
            position,
            pivot: args[2].clone(),
            value: args[3].clone(),
        })
    }
}

/// LRANGE command - Get a range of elements from a list
///
/// Syntax: LRANGE key start stop
pub struct LRangeCommand;

impl Command for LRangeCommand {
    fn name(&self) -> &'static str {
        "LRANGE"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::LRange {
            key: args[0].clone(),
            start: parse_int(&args[1])?,
            stop: parse_int(&args[2])?,
        })
    }
}

/// BLPOP/BRPOP command - Pop from the first non-empty list, waiting if all are empty
///
/// Syntax: BLPOP key [key ...] timeout
pub struct BlockingPopCommand {
    pub side: Side,
}

impl Command for BlockingPopCommand {
    fn name(&self) -> &'static str {
        match self.side {
            Side::Left => "BLPOP",
            Side::Right => "BRPOP",
        }
    }

    fn min_args(&self) -> usize {
        2
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        let (timeout, keys) = match args.split_last() {
            Some(split) => split,
            None => return Err(CommandError::ArgumentCount(self.name().to_string())),
        };

        Ok(Op::BlockingPop {
            keys: keys.to_vec(),
            side: self.side,
            timeout: parse_timeout(timeout)?,
        })
    }
}

/// BRPOPLPUSH command - Move the tail of one list to the head of another, waiting
/// for the source to be non-empty
///
/// Syntax: BRPOPLPUSH source destination timeout
pub struct BRPopLPushCommand;

impl Command for BRPopLPushCommand {
    fn name(&self) -> &'static str {
        "BRPOPLPUSH"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::BRPopLPush {
            source: args[0].clone(),
            destination: args[1].clone(),
            timeout: parse_timeout(&args[2])?,
        })
    }
}

pub(super) fn push(db: &mut Keyspace, key: &Bytes, side: Side, values: &[Bytes]) -> Result<RespValue, CommandError> {
    let len = db.list_push(key, side, values)?;
    Ok(RespValue::integer(len as i64))
}

pub(super) fn pop(db: &mut Keyspace, key: &Bytes, side: Side) -> Result<RespValue, CommandError> {
    Ok(match db.list_pop(key, side)? {
        Some(value) => RespValue::bulk_string(value),
        None => RespValue::null(),
    })
}

pub(super) fn llen(db: &mut Keyspace, key: &Bytes) -> Result<RespValue, CommandError> {
    let len = db.list(key)?.map_or(0, |list| list.len());
    Ok(RespValue::integer(len as i64))
}

/// Negative indexes count from the tail
pub(super) fn lindex(db: &mut Keyspace, key: &Bytes, index: i64) -> Result<RespValue, CommandError> {
    let list = match db.list(key)? {
        Some(list) => list,
        None => return Ok(RespValue::null()),
    };

    let len = list.len() as i64;
    let index = if index < 0 { len + index } else { index };
    if index < 0 || index >= len {
        return Ok(RespValue::null());
    }
    Ok(match list.get(index as usize) {
        Some(value) => RespValue::bulk_string(value.clone()),
        None => RespValue::null(),
    })
}

pub(super) fn linsert(
    db: &mut Keyspace,
    key: &Bytes,
    position: Position,
    pivot: &Bytes,
    value: &Bytes,
) -> Result<RespValue, CommandError> {
    let len = db.list_insert(key, position, pivot, value.clone())?;
    Ok(RespValue::integer(len))
}

/// Inclusive range; out-of-range bounds are clamped
pub(super) fn lrange(db: &mut Keyspace, key: &Bytes, start: i64, stop: i64) -> Result<RespValue, CommandError> {
    let list = match db.list(key)? {
        Some(list) => list,
        None => return Ok(RespValue::array(vec![])),
    };

    let len = list.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Ok(RespValue::array(vec![]));
    }

    let items = list
        .iter()
        .skip(start as usize)
        .take((stop - start + 1) as usize)
        .cloned();
    Ok(RespValue::bulk_array(items))
}

/// One BLPOP/BRPOP attempt
///
/// Keys are tried in argument order. None means every key is absent, so the
/// caller should wait. A key of another type fails the whole command at once.
pub(super) fn try_pop_any(db: &mut Keyspace, keys: &[Bytes], side: Side) -> Option<RespValue> {
    for key in keys {
        match db.key_type(key) {
            None => continue,
            Some(KeyType::List) => {}
            Some(_) => return Some(CommandError::WrongType.into()),
        }

        match db.list_pop(key, side) {
            Ok(Some(value)) => return Some(RespValue::bulk_array(vec![key.clone(), value])),
            Ok(None) => continue,
            Err(err) => return Some(err.into()),
        }
    }
    None
}

/// One BRPOPLPUSH attempt: pop the source tail, push it on the destination head
pub(super) fn try_rpoplpush(db: &mut Keyspace, source: &Bytes, destination: &Bytes) -> Option<RespValue> {
    match db.key_type(source) {
        None => return None,
        Some(KeyType::List) => {}
        Some(_) => return Some(CommandError::WrongType.into()),
    }
    match db.key_type(destination) {
        None | Some(KeyType::List) => {}
        Some(_) => return Some(CommandError::WrongType.into()),
    }

    let value = match db.list_pop(source, Side::Right) {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(err) => return Some(err.into()),
    };
    if let Err(err) = db.list_push(destination, Side::Left, &[value.clone()]) {
        return Some(err.into());
    }
    Some(RespValue::bulk_string(value))
}
