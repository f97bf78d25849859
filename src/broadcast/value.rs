//! The broadcast value
//!
//! A single string that is replaced as a whole on every update. Readers take a
//! cheap clone of the current [`Value`]; the payload is a `Bytes` so every
//! subscriber shares the same allocation.

use bytes::Bytes;
use parking_lot::RwLock;

/// A snapshot of the shared value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    version: u64,
    data: Bytes,
}

impl Value {
    fn new(version: u64, data: String) -> Self {
        Self {
            version,
            data: Bytes::from(data),
        }
    }

    /// Update counter, starting at 0 for the initial empty value
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Raw UTF-8 payload
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Payload as text
    pub fn as_str(&self) -> &str {
        // Only ever built from a String
        std::str::from_utf8(&self.data).unwrap_or_default()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer, many-reader value cell
#[derive(Debug)]
pub struct SharedValue {
    current: RwLock<Value>,
}

impl SharedValue {
    /// Create a cell holding the empty string at version 0
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Value::new(0, String::new())),
        }
    }

    /// Replace the value, returning the new snapshot
    pub fn replace(&self, data: impl Into<String>) -> Value {
        let data = data.into();
        let mut current = self.current.write();
        *current = Value::new(current.version + 1, data);
        current.clone()
    }

    /// Current snapshot
    pub fn load(&self) -> Value {
        self.current.read().clone()
    }
}

impl Default for SharedValue {
    fn default() -> Self {
        Self::new()
    }
}
