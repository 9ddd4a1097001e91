//! Per-connection execution context
//!
//! Holds everything a command may read or change about the caller: the
//! selected database, the transaction queue, watched keys and subscriptions.
//! Handlers receive it explicitly.

use super::Op;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};

/// A watched key, scoped to the database it was watched in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub db: usize,
    pub key: Bytes,
}

/// One transaction step, applied at EXEC
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    /// Upper-case command name, for logging
    pub name: &'static str,
    pub op: Op,
}

/// Channel and pattern subscriptions of a connection
#[derive(Debug, Default)]
pub struct Subscriber {
    channels: BTreeSet<Bytes>,
    patterns: BTreeSet<Bytes>,
}

impl Subscriber {
    /// Subscribe to a channel, false if already subscribed
    pub fn subscribe(&mut self, channel: Bytes) -> bool {
        self.channels.insert(channel)
    }

    pub fn unsubscribe(&mut self, channel: &Bytes) -> bool {
        self.channels.remove(channel)
    }

    pub fn psubscribe(&mut self, pattern: Bytes) -> bool {
        self.patterns.insert(pattern)
    }

    pub fn punsubscribe(&mut self, pattern: &Bytes) -> bool {
        self.patterns.remove(pattern)
    }

    /// Subscribed channels, in order
    pub fn channels(&self) -> Vec<Bytes> {
        self.channels.iter().cloned().collect()
    }

    pub fn patterns(&self) -> Vec<Bytes> {
        self.patterns.iter().cloned().collect()
    }

    /// Channels plus patterns
    pub fn count(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }
}

/// State of one client connection (or one script invocation)
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// Database index commands run against
    pub selected_db: usize,

    /// Set by a successful AUTH
    pub authenticated: bool,

    /// Some while between MULTI and EXEC/DISCARD
    transaction: Option<Vec<QueuedCommand>>,

    /// A command failed validation while queuing
    dirty: bool,

    /// Versions recorded by WATCH
    watched: HashMap<WatchKey, u64>,

    subscriber: Option<Subscriber>,

    /// Issued from inside a script, never suspends
    nested: bool,

    /// QUIT was received
    closing: bool,
}

impl ExecutionContext {
    /// Fresh context for a new connection
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for commands issued from a script running on behalf of a
    /// connection using database `selected_db`
    pub fn nested(selected_db: usize) -> Self {
        ExecutionContext {
            selected_db,
            nested: true,
            ..Self::default()
        }
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    // ---- transactions ----

    /// Check if MULTI was issued and not yet resolved
    pub fn in_tx(&self) -> bool {
        self.transaction.is_some()
    }

    pub(crate) fn start_tx(&mut self) {
        self.transaction = Some(Vec::new());
        self.dirty = false;
    }

    /// Append a step to the open transaction
    pub(crate) fn enqueue(&mut self, command: QueuedCommand) {
        if let Some(queue) = self.transaction.as_mut() {
            queue.push(command);
        }
    }

    /// Number of queued steps
    pub fn queued_len(&self) -> usize {
        self.transaction.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Close the transaction and hand back its steps. Watches are kept.
    pub(crate) fn take_tx(&mut self) -> Vec<QueuedCommand> {
        self.dirty = false;
        self.transaction.take().unwrap_or_default()
    }

    /// Leave transaction state entirely: queue, dirty flag and watches
    pub(crate) fn stop_tx(&mut self) {
        self.transaction = None;
        self.dirty = false;
        self.watched.clear();
    }

    // ---- watches ----

    /// Record the version of a key; watching it again overwrites
    pub(crate) fn watch(&mut self, db: usize, key: Bytes, version: u64) {
        self.watched.insert(WatchKey { db, key }, version);
    }

    pub(crate) fn unwatch(&mut self) {
        self.watched.clear();
    }

    pub fn watched(&self) -> impl Iterator<Item = (&WatchKey, &u64)> {
        self.watched.iter()
    }

    // ---- pub/sub ----

    /// Subscriptions, created on first use
    pub(crate) fn subscriber_mut(&mut self) -> &mut Subscriber {
        self.subscriber.get_or_insert_with(Subscriber::default)
    }

    /// Number of active subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriber.as_ref().map_or(0, Subscriber::count)
    }

    /// Subscribed mode: at least one channel or pattern
    pub fn in_pubsub(&self) -> bool {
        self.subscription_count() > 0
    }

    // ---- connection ----

    pub(crate) fn close(&mut self) {
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_lifecycle() {
        let mut ctx = ExecutionContext::new();
        assert!(!ctx.in_tx());

        ctx.start_tx();
        ctx.enqueue(QueuedCommand { name: "PING", op: Op::Ping(None) });
        ctx.set_dirty();
        assert!(ctx.in_tx());
        assert_eq!(ctx.queued_len(), 1);
        assert!(ctx.is_dirty());

        ctx.watch(0, Bytes::from("k"), 3);
        let steps = ctx.take_tx();
        assert_eq!(steps.len(), 1);
        assert!(!ctx.in_tx());
        assert!(!ctx.is_dirty());
        assert_eq!(ctx.watched().count(), 1);

        ctx.stop_tx();
        assert_eq!(ctx.watched().count(), 0);
    }

    #[test]
    fn test_enqueue_outside_transaction_is_ignored() {
        let mut ctx = ExecutionContext::new();
        ctx.enqueue(QueuedCommand { name: "PING", op: Op::Ping(None) });
        assert_eq!(ctx.queued_len(), 0);
    }

    #[test]
    fn test_rewatch_overwrites_version() {
        let mut ctx = ExecutionContext::new();
        ctx.watch(0, Bytes::from("k"), 1);
        ctx.watch(0, Bytes::from("k"), 4);
        ctx.watch(1, Bytes::from("k"), 0);

        let mut seen: Vec<(usize, u64)> = ctx.watched().map(|(w, v)| (w.db, *v)).collect();
        seen.sort();
        assert_eq!(seen, vec![(0, 4), (1, 0)]);
    }

    #[test]
    fn test_subscriptions() {
        let mut ctx = ExecutionContext::new();
        assert!(!ctx.in_pubsub());

        assert!(ctx.subscriber_mut().subscribe(Bytes::from("news")));
        assert!(!ctx.subscriber_mut().subscribe(Bytes::from("news")));
        assert!(ctx.subscriber_mut().psubscribe(Bytes::from("n*")));
        assert_eq!(ctx.subscription_count(), 2);
        assert!(ctx.in_pubsub());

        assert!(ctx.subscriber_mut().unsubscribe(&Bytes::from("news")));
        assert!(ctx.subscriber_mut().punsubscribe(&Bytes::from("n*")));
        assert!(!ctx.in_pubsub());
    }

    #[test]
    fn test_nested_context() {
        let ctx = ExecutionContext::nested(5);
        assert!(ctx.is_nested());
        assert_eq!(ctx.selected_db, 5);
        assert!(!ctx.in_tx());
    }
}
