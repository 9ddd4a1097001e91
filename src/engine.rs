//! Root server state
//!
//! One lock over every keyspace, one signal broadcast after each successful
//! command, and one shutdown token checked by every blocking wait.

use crate::config::Config;
use crate::error::CommandError;
use crate::store::Store;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared engine state, one per process
pub struct Engine {
    /// The keyspaces. This lock is the only writer gate.
    store: Mutex<Store>,

    /// Woken (all waiters) after every successful command
    signal: Notify,

    /// Cancelled on shutdown
    shutdown: CancellationToken,

    /// Password accepted by AUTH
    requirepass: Option<String>,
}

impl Engine {
    /// Create an engine from the server configuration
    pub fn new(config: &Config) -> Self {
        Engine {
            store: Mutex::new(Store::new(config.databases)),
            signal: Notify::new(),
            shutdown: CancellationToken::new(),
            requirepass: config.requirepass.clone(),
        }
    }

    /// Acquire the global lock
    pub async fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().await
    }

    /// Wake every suspended blocking command so it re-checks its predicate
    ///
    /// Called with the lock held, so a waiter that registered before
    /// releasing the lock cannot miss it.
    pub fn broadcast(&self) {
        self.signal.notify_waiters();
    }

    /// The condition signal blocking commands wait on
    pub(crate) fn signal(&self) -> &Notify {
        &self.signal
    }

    /// Token cancelled on shutdown
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Cancel every in-flight blocking wait and stop the listener
    pub fn shutdown(&self) {
        debug!("engine shutdown requested");
        self.shutdown.cancel();
    }

    /// Check if shutdown was requested
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Validate an AUTH password
    pub fn check_password(&self, password: &[u8]) -> Result<(), CommandError> {
        match &self.requirepass {
            None => Err(CommandError::NoPasswordSet),
            Some(expected) if expected.as_bytes() == password => Ok(()),
            Some(_) => Err(CommandError::InvalidPassword),
        }
    }

    /// Remove expired keys everywhere, waking waiters if anything went away
    pub async fn sweep_expired(&self) -> usize {
        let mut store = self.lock().await;
        let removed = store.sweep_expired();
        if removed > 0 {
            debug!("swept {} expired keys", removed);
            self.broadcast();
        }
        removed
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_password() {
        let engine = Engine::default();
        assert_eq!(engine.check_password(b"x"), Err(CommandError::NoPasswordSet));

        let config = Config {
            requirepass: Some("secret".to_string()),
            ..Config::default()
        };
        let engine = Engine::new(&config);
        assert_eq!(engine.check_password(b"secret"), Ok(()));
        assert_eq!(engine.check_password(b"nope"), Err(CommandError::InvalidPassword));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let engine = Engine::default();
        assert!(!engine.is_shutting_down());
        engine.shutdown();
        assert!(engine.is_shutting_down());
        engine.shutdown_token().cancelled().await;
    }
}
