//! Base client connection factory over an external transport.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    Connection, ConnectionError, ConnectionEvent, ConnectionFactory, ConnectionListener,
    EventPublisher,
};
use crate::message::Message;
use crate::transport::{Transport, TransportSession};
use async_trait::async_trait;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Produces one transport-backed connection per `get_connection` call to a
/// fixed `host:port`. Reuse and failover are layered on top by
/// [`super::CachingConnectionFactory`] and
/// [`super::FailoverConnectionFactory`].
pub struct ClientConnectionFactory {
    name: String,
    host: String,
    port: u16,
    connect_timeout: Duration,
    transport: Arc<dyn Transport>,
    active: AtomicBool,
    single_use: AtomicBool,
    /// Per-factory counter feeding host:port:sequence connection ids.
    sequence: AtomicU64,
    listener: RwLock<Option<Arc<dyn ConnectionListener>>>,
    publisher: RwLock<Option<Arc<dyn EventPublisher>>>,
}

impl ClientConnectionFactory {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transport,
            active: AtomicBool::new(false),
            single_use: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            listener: RwLock::new(None),
            publisher: RwLock::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Attach an optional fire-and-forget sink for open/close events.
    pub fn set_event_publisher(&self, publisher: Arc<dyn EventPublisher>) {
        *self
            .publisher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(publisher);
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn current_listener(&self) -> Option<Arc<dyn ConnectionListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_publisher(&self) -> Option<Arc<dyn EventPublisher>> {
        self.publisher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConnectionFactory for ClientConnectionFactory {
    async fn get_connection(&self) -> Result<Box<dyn Connection>, ConnectionError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotStarted(self.name.clone()));
        }

        let session = self
            .transport
            .open(&self.host, self.port, self.connect_timeout)
            .await
            .map_err(|e| {
                warn!(
                    factory = %self.name,
                    endpoint = %self.endpoint(),
                    error = %e,
                    "connect failed"
                );
                ConnectionError::ConnectFailure {
                    endpoint: self.endpoint(),
                    reason: e.to_string(),
                }
            })?;

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}:{}:{}", self.host, self.port, sequence);

        debug!(factory = %self.name, connection_id = %id, "opened connection");

        let publisher = self.current_publisher();
        if let Some(publisher) = &publisher {
            publisher.publish(ConnectionEvent::Opened {
                connection_id: id.clone(),
            });
        }

        Ok(Box::new(TransportConnection {
            id,
            session,
            open: AtomicBool::new(true),
            listener: self.current_listener(),
            publisher,
        }))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        info!(factory = %self.name, endpoint = %self.endpoint(), "starting");
        self.active.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) {
        info!(factory = %self.name, "stopping");
        self.active.store(false, Ordering::SeqCst);
    }

    fn register_listener(&self, listener: Arc<dyn ConnectionListener>) {
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn set_single_use(&self, single_use: bool) {
        self.single_use.store(single_use, Ordering::SeqCst);
    }

    fn is_single_use(&self) -> bool {
        self.single_use.load(Ordering::SeqCst)
    }

    fn factory_name(&self) -> &str {
        &self.name
    }
}

/// A connection bound to one exclusively owned transport session.
pub struct TransportConnection {
    id: String,
    session: Box<dyn TransportSession>,
    open: AtomicBool,
    listener: Option<Arc<dyn ConnectionListener>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl TransportConnection {
    /// Listener wired in by the owning factory; invoked by the inbound
    /// side of the transport, not by this crate.
    pub fn listener(&self) -> Option<&Arc<dyn ConnectionListener>> {
        self.listener.as_ref()
    }
}

#[async_trait]
impl Connection for TransportConnection {
    async fn send(&self, message: &Message) -> Result<(), ConnectionError> {
        if let Err(e) = self.session.send(message).await {
            // A failed connection is never reused; it will be discarded
            // instead of pooled when the caller closes it.
            self.open.store(false, Ordering::SeqCst);
            warn!(connection_id = %self.id, error = %e, "send failed");
            return Err(ConnectionError::SendFailure {
                connection_id: self.id.clone(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.session.close().await;
            debug!(connection_id = %self.id, "closed connection");
            if let Some(publisher) = &self.publisher {
                publisher.publish(ConnectionEvent::Closed {
                    connection_id: self.id.clone(),
                });
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.session.is_open()
    }

    fn connection_id(&self) -> String {
        self.id.clone()
    }
}
