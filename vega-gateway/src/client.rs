//! Client session seam
//!
//! TCP session plumbing lives outside this crate. The engine only ever
//! needs to push text back to whichever client asked for something, so a
//! client is just a [`ClientSink`]. Sessions are shared, reference-counted
//! handles; the correlation table clones them instead of holding session
//! objects, which keeps the server free of back-references.

use std::sync::{Arc, Mutex};

/// Delivery side of a connected client session
pub trait ClientSink: Send + Sync {
    /// Push one message to the client
    fn deliver(&self, message: &str);
}

/// Shared handle to a client session
pub type ClientRef = Arc<dyn ClientSink>;

/// In-memory client that records everything delivered to it
///
/// Used by tests and demos in place of a socket-backed session.
#[derive(Debug, Default)]
pub struct MemoryClient {
    messages: Mutex<Vec<String>>,
}

impl MemoryClient {
    /// Create a recording client
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything delivered so far
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether any delivered message contains `needle`
    pub fn saw(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl ClientSink for MemoryClient {
    fn deliver(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_client_records() {
        let client = MemoryClient::new();
        client.deliver("hello");
        client.deliver("world");
        assert_eq!(client.messages(), vec!["hello", "world"]);
        assert!(client.saw("wor"));
        assert!(!client.saw("nope"));
    }
}
