//! tcppool - Resilient outbound TCP connectivity for request/reply messaging
//!
//! Callers ask the outermost factory for "a usable connection" and send
//! payloads; endpoint selection, failover retry, and socket reuse are
//! handled underneath. The typical stack is a [`FailoverConnectionFactory`]
//! over one [`CachingConnectionFactory`] per endpoint, each producing
//! connections through an externally supplied [`transport::Transport`].

pub mod config;
pub mod connection;
pub mod core;
pub mod message;
pub mod pool;
pub mod transport;

pub use self::core::Core;
pub use config::Config;
pub use connection::{
    CachingConnectionFactory, ClientConnectionFactory, Connection, ConnectionError,
    ConnectionFactory, FailoverConnectionFactory,
};
pub use message::Message;
