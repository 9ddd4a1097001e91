//! Key type tags

use std::fmt;

/// The typed store a key lives in
///
/// Every key in a keyspace carries exactly one of these tags and has exactly
/// one entry in the matching typed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Binary-safe string
    String,

    /// Field -> value map
    Hash,

    /// Ordered list (deque)
    List,

    /// Unordered set of unique members
    Set,
}

impl KeyType {
    /// Name reported by the TYPE command
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
