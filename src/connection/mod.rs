//! Connection and connection-factory contracts.
//!
//! Both the real transport-backed implementations and the wrapping
//! implementations (pooled, failover) satisfy the same two traits, so
//! callers and wrappers never care which layer they are holding. Wrappers
//! own exactly one underlying delegate at a time, until it is swapped out
//! or closed.

pub mod cache;
pub mod client;
pub mod failover;

pub use cache::{CachingConnectionFactory, PooledConnection};
pub use client::ClientConnectionFactory;
pub use failover::{FailoverConnection, FailoverConnectionFactory};

use async_trait::async_trait;
use std::sync::Arc;

use crate::message::Message;

/// Error types for connection acquisition and use
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// A transport session could not be established to one endpoint.
    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectFailure { endpoint: String, reason: String },

    /// A transport write failed on an established connection.
    #[error("send failed on connection {connection_id}: {reason}")]
    SendFailure {
        connection_id: String,
        reason: String,
    },

    /// No idle or new-capacity connection became available in time.
    #[error("connection pool of {factory} exhausted after {waited_ms}ms")]
    PoolExhausted { factory: String, waited_ms: u64 },

    /// Every delegate factory was exhausted during a scan or retry sequence.
    #[error("all delegate factories failed")]
    AllDelegatesFailed(#[source] Box<ConnectionError>),

    /// The factory was used before `start()` or after `stop()`.
    #[error("connection factory {0} is not started")]
    NotStarted(String),
}

/// Callback invoked with inbound messages delivered on a connection.
///
/// Registered via [`ConnectionFactory::register_listener`] and forwarded
/// unchanged by wrapping factories; this crate's own logic never invokes it.
pub trait ConnectionListener: Send + Sync {
    fn on_message(&self, message: Message);
}

/// State transitions published to an optional fire-and-forget sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened { connection_id: String },
    Closed { connection_id: String },
    AllDelegatesFailed { factory: String },
}

/// Fire-and-forget event sink; no response is expected.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ConnectionEvent);
}

/// One logical session to a remote endpoint.
///
/// Connections are not safe for concurrent `send` calls from multiple
/// tasks without external synchronization; ownership of a checked-out or
/// failover-wrapped connection is single-threaded per call chain.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one message. A transport failure marks the connection
    /// not-open; whether it is retried depends on the wrapping layer.
    async fn send(&self, message: &Message) -> Result<(), ConnectionError>;

    /// Release the connection. Pool-aware wrappers recycle the physical
    /// connection instead of closing the transport. Idempotent.
    async fn close(&self);

    fn is_open(&self) -> bool;

    /// Opaque identity, `host:port:sequence` for transport-backed
    /// connections. Wrappers report the identity of their delegate.
    fn connection_id(&self) -> String;
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connection_id", &self.connection_id())
            .finish()
    }
}

/// Produces connections to one fixed endpoint (or, for wrappers, to a
/// pool or an ordered list of delegate factories).
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Obtain a usable connection, or fail with
    /// [`ConnectionError::ConnectFailure`] when no transport session can
    /// be established.
    async fn get_connection(&self) -> Result<Box<dyn Connection>, ConnectionError>;

    /// True once started and not stopped. Eligibility to be tried, not a
    /// guarantee that the endpoint is reachable.
    fn is_active(&self) -> bool;

    async fn start(&self);

    /// Stop the factory; caching factories close their pooled idle
    /// connections, already checked-out connections are unaffected until
    /// individually closed.
    async fn stop(&self);

    /// Wire inbound-message delivery. Side effect only; wrapping
    /// factories forward the listener unchanged.
    fn register_listener(&self, listener: Arc<dyn ConnectionListener>);

    /// When true, every `get_connection` yields a freshly opened session
    /// that is discarded after one use, never pooled.
    fn set_single_use(&self, single_use: bool);

    fn is_single_use(&self) -> bool;

    fn factory_name(&self) -> &str;
}
