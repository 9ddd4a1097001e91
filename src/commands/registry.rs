//! Command registry
//!
//! Centralized registry for all available commands, built once at startup and
//! read-only afterwards. Registering a name twice is an error.

use super::{admin, hash, key, list, pubsub, set, string, transaction, ttl, Command};
use crate::error::RegistryError;
use crate::store::Side;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of all available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in command
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        // Register connection and server commands
        registry.register(Arc::new(admin::PingCommand))?;
        registry.register(Arc::new(admin::EchoCommand))?;
        registry.register(Arc::new(admin::SelectCommand))?;
        registry.register(Arc::new(admin::AuthCommand))?;
        registry.register(Arc::new(admin::QuitCommand))?;
        registry.register(Arc::new(admin::DbSizeCommand))?;
        registry.register(Arc::new(admin::FlushDbCommand))?;

        // Register key commands
        registry.register(Arc::new(key::DelCommand))?;
        registry.register(Arc::new(key::ExistsCommand))?;
        registry.register(Arc::new(key::TypeCommand))?;

        // Register TTL commands
        registry.register(Arc::new(ttl::ExpireCommand))?;
        registry.register(Arc::new(ttl::TtlCommand))?;
        registry.register(Arc::new(ttl::PersistCommand))?;

        // Register string commands
        registry.register(Arc::new(string::SetCommand))?;
        registry.register(Arc::new(string::GetCommand))?;

        // Register hash commands
        registry.register(Arc::new(hash::HSetCommand))?;
        registry.register(Arc::new(hash::HGetCommand))?;
        registry.register(Arc::new(hash::HDelCommand))?;

        // Register set commands
        registry.register(Arc::new(set::SAddCommand))?;
        registry.register(Arc::new(set::SMembersCommand))?;
        registry.register(Arc::new(set::SIsMemberCommand))?;

        // Register list commands
        for side in [Side::Left, Side::Right] {
            registry.register(Arc::new(list::PushCommand { side }))?;
            registry.register(Arc::new(list::PopCommand { side }))?;
            registry.register(Arc::new(list::BlockingPopCommand { side }))?;
        }
        registry.register(Arc::new(list::LLenCommand))?;
        registry.register(Arc::new(list::LIndexCommand))?;
        registry.register(Arc::new(list::LInsertCommand))?;
        registry.register(Arc::new(list::LRangeCommand))?;
        registry.register(Arc::new(list::BRPopLPushCommand))?;

        // Register transaction commands
        registry.register(Arc::new(transaction::MultiCommand))?;
        registry.register(Arc::new(transaction::ExecCommand))?;
        registry.register(Arc::new(transaction::DiscardCommand))?;
        registry.register(Arc::new(transaction::WatchCommand))?;
        registry.register(Arc::new(transaction::UnwatchCommand))?;

        // Register subscription commands
        registry.register(Arc::new(pubsub::SubscribeCommand))?;
        registry.register(Arc::new(pubsub::UnsubscribeCommand))?;
        registry.register(Arc::new(pubsub::PSubscribeCommand))?;
        registry.register(Arc::new(pubsub::PUnsubscribeCommand))?;

        Ok(registry)
    }

    /// Register a command under its upper-case name
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let name = command.name().to_uppercase();
        if self.commands.contains_key(&name) {
            return Err(RegistryError::Conflict(name));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    /// Get a command by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.commands.get(&name.to_uppercase())
    }

    /// Check if a command exists
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    /// Get all command names, sorted
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = CommandRegistry::standard().unwrap();

        assert!(registry.contains("SET"));
        assert!(registry.contains("get"));
        assert!(registry.contains("BRPOPLPUSH"));
        assert!(registry.contains("brpop"));
        assert!(!registry.contains("NONEXISTENT"));
        assert_eq!(registry.len(), 41);
    }

    #[test]
    fn test_get_command() {
        let registry = CommandRegistry::standard().unwrap();

        let cmd = registry.get("lpush").unwrap();
        assert_eq!(cmd.name(), "LPUSH");
        assert_eq!(cmd.min_args(), 2);
    }

    #[test]
    fn test_register_twice_conflicts() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(string::GetCommand)).unwrap();

        let err = registry.register(Arc::new(string::GetCommand)).unwrap_err();
        assert_eq!(err, RegistryError::Conflict("GET".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_command_names_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(string::SetCommand)).unwrap();
        registry.register(Arc::new(key::DelCommand)).unwrap();
        assert_eq!(registry.command_names(), vec!["DEL", "SET"]);
    }
}
