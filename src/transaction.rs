//! Transaction coordinator (MULTI/EXEC/DISCARD/WATCH/UNWATCH)
//!
//! Queued steps live in the connection's `ExecutionContext`. EXEC takes the
//! global lock once: it compares every watched version, then runs the whole
//! queue before releasing the lock, so no other command can interleave.

use crate::commands::{executor, ExecutionContext};
use crate::engine::Engine;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Store;
use bytes::Bytes;
use tracing::debug;

/// Result of an EXEC that got past its precondition checks
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// One reply per queued step, in queue order
    Committed(Vec<RespValue>),

    /// A watched key changed; nothing ran
    Aborted,
}

impl From<ExecOutcome> for RespValue {
    fn from(outcome: ExecOutcome) -> Self {
        match outcome {
            ExecOutcome::Committed(replies) => RespValue::array(replies),
            ExecOutcome::Aborted => RespValue::NullArray,
        }
    }
}

/// MULTI: start queuing
pub fn multi(ctx: &mut ExecutionContext) -> Result<RespValue, CommandError> {
    if ctx.is_nested() {
        return Err(CommandError::NotFromScript);
    }
    if ctx.in_tx() {
        return Err(CommandError::NestedMulti);
    }
    ctx.start_tx();
    Ok(RespValue::ok())
}

/// WATCH precondition
pub fn check_watch(ctx: &ExecutionContext) -> Result<(), CommandError> {
    if ctx.is_nested() {
        return Err(CommandError::NotFromScript);
    }
    if ctx.in_tx() {
        return Err(CommandError::WatchInTx);
    }
    Ok(())
}

/// WATCH: record the current version of each key in the selected database
pub async fn watch(engine: &Engine, ctx: &mut ExecutionContext, keys: &[Bytes]) -> Result<RespValue, CommandError> {
    check_watch(ctx)?;
    let mut store = engine.lock().await;
    watch_locked(&mut store, ctx, keys);
    Ok(RespValue::ok())
}

pub(crate) fn watch_locked(store: &mut Store, ctx: &mut ExecutionContext, keys: &[Bytes]) {
    let db = ctx.selected_db;
    for key in keys {
        let version = store.current_version(db, key);
        ctx.watch(db, key.clone(), version);
    }
}

/// UNWATCH: always OK, even outside a transaction
pub fn unwatch(ctx: &mut ExecutionContext) -> RespValue {
    ctx.unwatch();
    RespValue::ok()
}

/// DISCARD: drop the queue and the watches
pub fn discard(ctx: &mut ExecutionContext) -> Result<RespValue, CommandError> {
    if !ctx.in_tx() {
        return Err(CommandError::DiscardWithoutMulti);
    }
    ctx.stop_tx();
    Ok(RespValue::ok())
}

/// EXEC precondition
pub fn check_exec(ctx: &ExecutionContext) -> Result<(), CommandError> {
    if ctx.is_nested() {
        return Err(CommandError::NestedExec);
    }
    if !ctx.in_tx() {
        return Err(CommandError::ExecWithoutMulti);
    }
    Ok(())
}

/// EXEC: run the queue atomically, or abort
///
/// A dirty transaction fails without taking the lock. Either way the
/// connection leaves transaction state and forgets its watches.
pub async fn exec(engine: &Engine, ctx: &mut ExecutionContext) -> Result<RespValue, CommandError> {
    check_exec(ctx)?;
    if ctx.is_dirty() {
        debug!("EXEC of a dirty transaction, discarding {} steps", ctx.queued_len());
        ctx.stop_tx();
        return Err(CommandError::TransactionAbort);
    }

    let mut store = engine.lock().await;
    let outcome = exec_locked(&mut store, ctx);
    if let ExecOutcome::Committed(_) = outcome {
        engine.broadcast();
    }
    Ok(outcome.into())
}

/// Compare watched versions, then run every step, with the lock held
pub(crate) fn exec_locked(store: &mut Store, ctx: &mut ExecutionContext) -> ExecOutcome {
    let changed = ctx
        .watched()
        .any(|(watched, version)| store.current_version(watched.db, &watched.key) != *version);
    if changed {
        debug!("watched key changed, EXEC aborted");
        ctx.stop_tx();
        return ExecOutcome::Aborted;
    }

    let steps = ctx.take_tx();
    ctx.unwatch();
    debug!("EXEC running {} steps", steps.len());

    let replies = steps
        .iter()
        .map(|step| executor::execute_queued(step, ctx, store))
        .collect();
    ExecOutcome::Committed(replies)
}
