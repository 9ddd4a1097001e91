//! Command dispatcher
//!
//! Routes incoming commands to the appropriate handler: straight under the
//! global lock, into the connection's transaction queue, or through the
//! blocking coordinator. The registry is immutable once the dispatcher is
//! built; the command counter is a plain atomic.

use crate::blocking;
use crate::commands::{self, allowed_while_subscribed, executor, CommandRegistry, ExecutionContext, Op, OpClass, QueuedCommand};
use crate::engine::Engine;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Store;
use crate::transaction;
use base64::Engine as _;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Interception point run before routing
///
/// Receives the upper-case command name and its arguments. Returning
/// `Some(replies)` means the command was fully handled.
pub type PreHook = Arc<dyn Fn(&mut ExecutionContext, &str, &[Bytes]) -> Option<Vec<RespValue>> + Send + Sync>;

/// Command dispatcher
///
/// Receives decoded requests, validates them, and routes to appropriate handlers
pub struct Dispatcher {
    /// Command registry
    registry: CommandRegistry,

    /// Shared store, signal and shutdown token
    engine: Arc<Engine>,

    pre_hook: Option<PreHook>,

    /// Commands successfully routed to a handler
    processed: AtomicU64,
}

/// Outcome of name lookup and argument validation
enum Route {
    /// Already answered (pre-hook, unknown name, bad arguments, ...)
    Replied(Vec<RespValue>),

    /// Validated, ready to run
    Ready(&'static str, Op),
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(engine: Arc<Engine>, registry: CommandRegistry) -> Self {
        Dispatcher {
            registry,
            engine,
            pre_hook: None,
            processed: AtomicU64::new(0),
        }
    }

    /// Install the pre-hook
    pub fn with_pre_hook(mut self, hook: PreHook) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Number of commands routed to a handler so far
    pub fn processed_commands(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Dispatch one request from a connection
    ///
    /// Produces zero or more replies: none when a blocking wait was cancelled
    /// by shutdown, several for multi-channel subscription commands.
    pub async fn dispatch(&self, ctx: &mut ExecutionContext, request: Vec<Bytes>) -> Vec<RespValue> {
        let (name, op) = match self.route(ctx, &request) {
            Route::Replied(replies) => return replies,
            Route::Ready(name, op) => (name, op),
        };

        match op {
            Op::Auth(password) => vec![commands::auth(&self.engine, ctx, &password)],
            Op::Quit => vec![commands::quit(ctx)],
            Op::Multi => vec![reply(transaction::multi(ctx))],
            Op::Exec => vec![reply(transaction::exec(&self.engine, ctx).await)],
            Op::Discard => vec![reply(transaction::discard(ctx))],
            Op::Watch(keys) => vec![reply(transaction::watch(&self.engine, ctx, &keys).await)],
            Op::Unwatch => {
                // Clears now; inside MULTI a no-op step is queued as well
                let ok = transaction::unwatch(ctx);
                if ctx.in_tx() {
                    ctx.enqueue(QueuedCommand { name, op: Op::Unwatch });
                    return vec![RespValue::queued()];
                }
                vec![ok]
            }
            op if op.class() == OpClass::PubSub => {
                if ctx.in_tx() {
                    ctx.set_dirty();
                    return vec![CommandError::NotAllowedInTx.into()];
                }
                commands::apply_pubsub(ctx, &op)
            }
            op if op.class() == OpClass::Blocking && !ctx.in_tx() => {
                self.block(ctx, op).await.into_iter().collect()
            }
            op => vec![self.run(ctx, name, op).await],
        }
    }

    /// Dispatch a command issued from a script
    ///
    /// The caller already holds the global lock (`store`) and `ctx` is a
    /// nested context. Never suspends: blocking commands try once.
    pub fn dispatch_nested(&self, ctx: &mut ExecutionContext, store: &mut Store, request: Vec<Bytes>) -> Vec<RespValue> {
        debug_assert!(ctx.is_nested(), "dispatch_nested needs a nested context");

        let op = match self.route(ctx, &request) {
            Route::Replied(replies) => return replies,
            Route::Ready(_, op) => op,
        };

        let result = match op {
            Op::Multi => reply(transaction::multi(ctx)),
            Op::Exec => CommandError::NestedExec.into(),
            Op::Discard => reply(transaction::discard(ctx)),
            Op::Watch(_) | Op::Auth(_) | Op::Quit => CommandError::NotFromScript.into(),
            op if op.class() == OpClass::PubSub => CommandError::NotFromScript.into(),
            op => {
                let result = executor::execute(&op, ctx, store);
                if !result.is_error() {
                    self.engine.broadcast();
                }
                result
            }
        };
        vec![result]
    }

    /// Name lookup, pre-hook, counter and argument validation
    fn route(&self, ctx: &mut ExecutionContext, request: &[Bytes]) -> Route {
        let (raw_name, args) = match request.split_first() {
            Some(split) => split,
            None => return Route::Replied(Vec::new()),
        };
        let name = command_name(raw_name);
        debug!("Dispatching command: {}", name);

        if let Some(hook) = &self.pre_hook {
            if let Some(replies) = hook(ctx, &name, args) {
                debug!("{} handled by pre-hook", name);
                return Route::Replied(replies);
            }
        }

        // Look up the command
        let command = match self.registry.get(&name) {
            Some(cmd) => cmd,
            None => {
                warn!("Unknown command: {}", name);
                if ctx.in_tx() {
                    ctx.set_dirty();
                }
                return Route::Replied(vec![CommandError::UnknownCommand(name).into()]);
            }
        };
        self.processed.fetch_add(1, Ordering::Relaxed);

        if ctx.in_pubsub() && !allowed_while_subscribed(command.name()) {
            return Route::Replied(vec![CommandError::SubscribedContext.into()]);
        }

        match command.prepare(args) {
            Ok(op) => Route::Ready(command.name(), op),
            Err(err) if ctx.in_tx() => {
                // Reported at EXEC
                debug!("{} rejected while queuing: {}", name, err);
                ctx.set_dirty();
                Route::Replied(vec![RespValue::queued()])
            }
            Err(err) => Route::Replied(vec![err.into()]),
        }
    }

    /// Run a keyspace op under the lock, or queue it inside MULTI
    async fn run(&self, ctx: &mut ExecutionContext, name: &'static str, op: Op) -> RespValue {
        if ctx.in_tx() {
            ctx.enqueue(QueuedCommand { name, op });
            return RespValue::queued();
        }

        let mut store = self.engine.lock().await;
        let result = executor::execute(&op, ctx, &mut store);
        if !result.is_error() {
            self.engine.broadcast();
        }
        result
    }

    /// Suspend until a blocking op can complete, times out or is cancelled
    async fn block(&self, ctx: &ExecutionContext, op: Op) -> Option<RespValue> {
        let db = ctx.selected_db;
        blocking::block(
            &self.engine,
            op.timeout(),
            |store| executor::attempt(&op, db, store),
            || executor::timeout_reply(&op),
        )
        .await
    }
}

fn reply(result: Result<RespValue, CommandError>) -> RespValue {
    result.unwrap_or_else(RespValue::from)
}

/// Upper-case command name; non UTF-8 names are logged as base64
fn command_name(raw: &Bytes) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_uppercase(),
        Err(_) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
            warn!("Command name is not valid UTF-8 (base64: {})", encoded);
            String::from_utf8_lossy(raw).to_uppercase()
        }
    }
}
