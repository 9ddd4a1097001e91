//! In-memory storage module
//!
//! Provides the keyspaces, their typed stores and per-key version counters.
//! This module is independent of protocol and command handling (loose coupling).

mod value;
mod keyspace;
mod databases;

pub use value::KeyType;
pub use keyspace::{Keyspace, Position, Side};
pub use databases::Store;
