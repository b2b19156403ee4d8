//! Opaque message values carried through connections.

use std::collections::HashMap;

/// A payload-plus-headers value handed to `Connection::send`.
///
/// The connectivity layer never inspects the payload; it only carries it
/// to the transport session. Headers are free-form string pairs for the
/// surrounding messaging layer (correlation ids, connection ids, etc).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    payload: Vec<u8>,
    headers: HashMap<String, String>,
}

impl Message {
    /// Create a message from a raw payload with no headers.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            headers: HashMap::new(),
        }
    }

    /// Attach a header, returning the modified message.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}
