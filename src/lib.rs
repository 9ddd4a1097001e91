//! FerrumKV - A Redis-compatible in-memory key-value server
//!
//! FerrumKV is designed with strong cohesion and loose coupling principles:
//! - `store` knows nothing about connections or the protocol
//! - `transaction` and `blocking` coordinate over the engine's single lock
//! - `dispatch` is the only place that decides how a command runs

pub mod protocol;
pub mod store;
pub mod config;
pub mod error;
pub mod engine;
pub mod commands;
pub mod transaction;
pub mod blocking;
pub mod dispatch;
pub mod server;

/// Re-export commonly used types
pub use commands::{Command, CommandRegistry, ExecutionContext};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use engine::Engine;
pub use error::{CommandError, RegistryError};
pub use protocol::{RespError, RespValue};
pub use store::{Keyspace, Store};
