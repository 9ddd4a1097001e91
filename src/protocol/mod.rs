//! RESP2 protocol implementation
//!
//! Decodes client requests into command name + arguments and encodes replies.
//! It is completely independent from other modules (loose coupling).

mod types;
mod resp;

pub use types::{RespValue, RespError};
pub use resp::{RespParser, RespEncoder};
