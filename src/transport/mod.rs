//! Transport capability consumed by client connection factories.
//!
//! The actual socket I/O lives outside this crate: a factory is handed a
//! [`Transport`] at construction and asks it for one byte-stream session per
//! connection. Framing, TLS, and wire encoding are the transport's concern.

use async_trait::async_trait;
use std::io;
use std::time::Duration;

use crate::message::Message;

/// Opens byte-stream sessions to a fixed style of endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session to `host:port`, bounded by `timeout`.
    async fn open(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> io::Result<Box<dyn TransportSession>>;
}

/// One established session, owned exclusively by a single connection.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Perform a blocking write of one message.
    async fn send(&self, message: &Message) -> io::Result<()>;

    /// Whether the session is still usable (not closed by either side).
    fn is_open(&self) -> bool;

    /// Tear the session down. Must be safe to call more than once.
    async fn close(&self);
}
