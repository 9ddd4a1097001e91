//! Op interpreter
//!
//! Runs keyspace ops against the store. The caller holds the global lock and
//! owns the broadcast that follows. Transaction control (except UNWATCH),
//! subscription and connection ops are routed elsewhere by the dispatcher.

use super::{admin, hash, key, list, set, string, ttl, ExecutionContext, Op, QueuedCommand};
use crate::blocking;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Store;
use tracing::{trace, warn};

/// Run one keyspace op to completion
///
/// Blocking ops get a single attempt and fall back to their timeout reply.
pub fn execute(op: &Op, ctx: &mut ExecutionContext, store: &mut Store) -> RespValue {
    let db = ctx.selected_db;
    let result = match op {
        Op::Ping(message) => Ok(admin::ping(ctx, message.as_ref())),
        Op::Echo(message) => Ok(RespValue::bulk_string(message.clone())),
        Op::Select(index) => admin::select(ctx, store, *index),
        Op::DbSize => Ok(admin::dbsize(store, db)),
        Op::FlushDb => Ok(admin::flushdb(store, db)),

        Op::Del(keys) => Ok(key::del(store.db(db), keys)),
        Op::Exists(keys) => Ok(key::exists(store.db(db), keys)),
        Op::Type(k) => Ok(key::key_type(store.db(db), k)),
        Op::Expire { key, seconds } => Ok(ttl::expire(store.db(db), key, *seconds)),
        Op::Ttl(k) => Ok(ttl::ttl(store.db(db), k)),
        Op::Persist(k) => Ok(ttl::persist(store.db(db), k)),

        Op::Get(k) => string::get(store.db(db), k),
        Op::Set { key, value } => Ok(string::set(store.db(db), key, value)),

        Op::HSet { key, pairs } => hash::hset(store.db(db), key, pairs),
        Op::HGet { key, field } => hash::hget(store.db(db), key, field),
        Op::HDel { key, fields } => hash::hdel(store.db(db), key, fields),

        Op::SAdd { key, members } => set::sadd(store.db(db), key, members),
        Op::SMembers(k) => set::smembers(store.db(db), k),
        Op::SIsMember { key, member } => set::sismember(store.db(db), key, member),

        Op::Push { key, side, values } => list::push(store.db(db), key, *side, values),
        Op::Pop { key, side } => list::pop(store.db(db), key, *side),
        Op::LLen(k) => list::llen(store.db(db), k),
        Op::LIndex { key, index } => list::lindex(store.db(db), key, *index),
        Op::LInsert { key, position, pivot, value } => {
            list::linsert(store.db(db), key, *position, pivot, value)
        }
        Op::LRange { key, start, stop } => list::lrange(store.db(db), key, *start, *stop),

        Op::BlockingPop { .. } | Op::BRPopLPush { .. } => {
            Ok(blocking::attempt_once(store, |store| attempt(op, db, store), || timeout_reply(op)))
        }

        Op::Unwatch => Ok(crate::transaction::unwatch(ctx)),

        Op::Multi
        | Op::Exec
        | Op::Discard
        | Op::Watch(_)
        | Op::Subscribe(_)
        | Op::Unsubscribe(_)
        | Op::PSubscribe(_)
        | Op::PUnsubscribe(_)
        | Op::Auth(_)
        | Op::Quit => {
            warn!("{:?} reached the keyspace executor", op);
            Err(CommandError::NotAllowedInTx)
        }
    };

    result.unwrap_or_else(RespValue::from)
}

/// One attempt of a blocking op against database `db`
///
/// None means nothing could be popped yet. Any `Some` (including an error
/// reply) ends the wait.
pub fn attempt(op: &Op, db: usize, store: &mut Store) -> Option<RespValue> {
    match op {
        Op::BlockingPop { keys, side, .. } => list::try_pop_any(store.db(db), keys, *side),
        Op::BRPopLPush { source, destination, .. } => {
            list::try_rpoplpush(store.db(db), source, destination)
        }
        _ => None,
    }
}

/// Reply a blocking op produces when its wait runs out
pub fn timeout_reply(op: &Op) -> RespValue {
    match op {
        Op::BRPopLPush { .. } => RespValue::null(),
        _ => RespValue::NullArray,
    }
}

/// Run one step of a committed transaction
pub(crate) fn execute_queued(command: &QueuedCommand, ctx: &mut ExecutionContext, store: &mut Store) -> RespValue {
    trace!("EXEC step {}", command.name);
    execute(&command.op, ctx, store)
}
