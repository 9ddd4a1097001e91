//! RESP2 value types
//!
//! Replies produced by the engine and the frames a client may send

use bytes::Bytes;
use std::fmt;

/// RESP2 value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple strings: +OK\r\n
    SimpleString(String),

    /// Errors: -Error message\r\n
    Error(String),

    /// Integers: :1000\r\n
    Integer(i64),

    /// Bulk strings: $6\r\nfoobar\r\n
    BulkString(Bytes),

    /// Null bulk string: $-1\r\n
    Null,

    /// Null array: *-1\r\n (aborted EXEC, blocking pop timeout)
    NullArray,

    /// Arrays: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Create a simple string
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// The +OK status line
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Status line telling a client its command went into the transaction queue
    pub fn queued() -> Self {
        RespValue::SimpleString("QUEUED".to_string())
    }

    /// Create an error
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create an integer
    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    /// Create a bulk string from bytes
    pub fn bulk_string(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    /// Create a null value
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Create an array
    pub fn array(v: Vec<RespValue>) -> Self {
        RespValue::Array(v)
    }

    /// Build an array of bulk strings
    pub fn bulk_array<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        RespValue::Array(items.into_iter().map(|b| RespValue::BulkString(b.into())).collect())
    }

    /// Check if this is an error reply
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "SimpleString({})", s),
            RespValue::Error(e) => write!(f, "Error({})", e),
            RespValue::Integer(i) => write!(f, "Integer({})", i),
            RespValue::BulkString(b) => write!(f, "BulkString({} bytes)", b.len()),
            RespValue::Null => write!(f, "Null"),
            RespValue::NullArray => write!(f, "NullArray"),
            RespValue::Array(arr) => write!(f, "Array({} elements)", arr.len()),
        }
    }
}

/// RESP request decoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum RespError {
    /// Invalid protocol format
    InvalidProtocol(String),

    /// Length or count header is not a number
    InvalidLength,

    /// Request is larger than the decoder accepts
    TooLarge,
}

impl fmt::Display for RespError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespError::InvalidProtocol(msg) => write!(f, "Invalid protocol: {}", msg),
            RespError::InvalidLength => write!(f, "invalid length header"),
            RespError::TooLarge => write!(f, "request too large"),
        }
    }
}

impl std::error::Error for RespError {}
