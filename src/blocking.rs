//! Blocking coordinator
//!
//! A blocking command retries its attempt under the global lock each time the
//! engine broadcasts, until the attempt succeeds, the deadline passes or the
//! engine shuts down. Queued and nested callers use `attempt_once` instead and
//! never suspend.

use crate::engine::Engine;
use crate::protocol::RespValue;
use crate::store::Store;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Wait until `attempt` produces a reply
///
/// `attempt` runs with the lock held and returns None while there is nothing
/// to take. `timeout` of None waits forever. Returns None (no reply at all)
/// when the engine shuts down.
pub async fn block<A, T>(engine: &Engine, timeout: Option<Duration>, mut attempt: A, on_timeout: T) -> Option<RespValue>
where
    A: FnMut(&mut Store) -> Option<RespValue>,
    T: FnOnce() -> RespValue,
{
    // A deadline past any reachable instant waits forever
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    let mut store = engine.lock().await;

    loop {
        if let Some(reply) = attempt(&mut store) {
            // A successful attempt mutated the store
            if !reply.is_error() {
                engine.broadcast();
            }
            return Some(reply);
        }
        if engine.is_shutting_down() {
            return None;
        }

        // Registered before the lock is released: a broadcast issued by the
        // next lock holder cannot be missed.
        let notified = engine.signal().notified();
        drop(store);

        tokio::select! {
            _ = notified => {}
            _ = deadline_elapsed(deadline) => {
                debug!("blocking wait timed out");
                return Some(on_timeout());
            }
            _ = engine.shutdown_token().cancelled() => {
                debug!("blocking wait cancelled by shutdown");
                return None;
            }
        }

        store = engine.lock().await;
    }
}

/// Single try for callers that must not suspend
pub fn attempt_once<A, T>(store: &mut Store, attempt: A, on_timeout: T) -> RespValue
where
    A: FnOnce(&mut Store) -> Option<RespValue>,
    T: FnOnce() -> RespValue,
{
    attempt(store).unwrap_or_else(on_timeout)
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::store::Side;
    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn pop_left(key: &'static str) -> impl FnMut(&mut Store) -> Option<RespValue> {
        move |store: &mut Store| {
            let key = Bytes::from_static(key.as_bytes());
            match store.db(0).list_pop(&key, Side::Left) {
                Ok(Some(value)) => Some(RespValue::bulk_array(vec![key, value])),
                Ok(None) => None,
                Err(err) => Some(err.into()),
            }
        }
    }

    fn pair(key: &'static str, value: &'static str) -> RespValue {
        RespValue::bulk_array(vec![Bytes::from(key), Bytes::from(value)])
    }

    #[tokio::test]
    async fn test_ready_value_returns_immediately() {
        let engine = Engine::default();
        engine
            .lock()
            .await
            .db(0)
            .list_push(&Bytes::from("l"), Side::Right, &[Bytes::from("x")])
            .unwrap();

        let reply = block(&engine, None, pop_left("l"), || RespValue::NullArray).await;
        assert_eq!(reply, Some(pair("l", "x")));
        assert!(!engine.lock().await.db(0).exists(&Bytes::from("l")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_absent_key() {
        let engine = Engine::default();
        let started = Instant::now();

        let reply = block(&engine, Some(Duration::from_secs(1)), pop_left("nope"), || RespValue::NullArray).await;
        assert_eq!(reply, Some(RespValue::NullArray));
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_push_wakes_waiter() {
        let engine = Engine::default();
        let mut waiter = task::spawn(block(&engine, None, pop_left("l"), || RespValue::NullArray));
        assert_pending!(waiter.poll());

        // An unrelated broadcast wakes the waiter, which goes back to sleep
        engine.broadcast();
        assert!(waiter.is_woken());
        assert_pending!(waiter.poll());

        {
            let mut store = engine.lock().await;
            store.db(0).list_push(&Bytes::from("l"), Side::Right, &[Bytes::from("x")]).unwrap();
            engine.broadcast();
        }
        assert!(waiter.is_woken());
        assert_ready_eq!(waiter.poll(), Some(pair("l", "x")));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_without_reply() {
        let engine = Engine::default();
        let mut waiter = task::spawn(block(&engine, None, pop_left("l"), || RespValue::NullArray));
        assert_pending!(waiter.poll());

        engine.shutdown();
        assert!(waiter.is_woken());
        assert_ready_eq!(waiter.poll(), None);
    }

    #[tokio::test]
    async fn test_no_wait_after_shutdown() {
        let engine = Engine::default();
        engine.shutdown();

        let reply = block(&engine, None, pop_left("l"), || RespValue::NullArray).await;
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn test_unreachable_deadline_waits_forever() {
        let engine = Engine::default();
        let mut waiter = task::spawn(block(&engine, Some(Duration::MAX), pop_left("l"), || RespValue::NullArray));
        assert_pending!(waiter.poll());

        engine.shutdown();
        assert_ready_eq!(waiter.poll(), None);
    }

    #[tokio::test]
    async fn test_wrong_type_does_not_wake_waiters() {
        let engine = Engine::default();
        engine.lock().await.db(0).set_string(&Bytes::from("s"), Bytes::from("v"));

        let mut waiter = task::spawn(block(&engine, None, pop_left("l"), || RespValue::NullArray));
        assert_pending!(waiter.poll());

        let reply = block(&engine, None, pop_left("s"), || RespValue::NullArray).await;
        assert_eq!(reply, Some(CommandError::WrongType.into()));
        assert!(!waiter.is_woken());
        assert_pending!(waiter.poll());
    }

    #[test]
    fn test_attempt_once() {
        let mut store = Store::new(16);
        let reply = attempt_once(&mut store, pop_left("l"), || RespValue::Null);
        assert_eq!(reply, RespValue::Null);

        store.db(0).list_push(&Bytes::from("l"), Side::Right, &[Bytes::from("x")]).unwrap();
        let reply = attempt_once(&mut store, pop_left("l"), || RespValue::Null);
        assert_eq!(reply, pair("l", "x"));
    }
}
