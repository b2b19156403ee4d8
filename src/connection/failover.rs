//! Failover across an ordered list of delegate factories.
//!
//! The factory presents a single [`ConnectionFactory`] facade over N
//! delegates. A sticky cursor remembers the last delegate that worked, so
//! repeated traffic converges on the healthy endpoint instead of retrying
//! a known-bad one first. Per-send retry makes transient failures
//! invisible to the caller: a top-level send either fully succeeds on
//! some delegate or fails with [`ConnectionError::AllDelegatesFailed`].

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use super::{
    Connection, ConnectionError, ConnectionEvent, ConnectionFactory, ConnectionListener,
    EventPublisher,
};
use crate::message::Message;
use async_trait::async_trait;

/// Facade over an ordered, construction-time-fixed list of delegates.
pub struct FailoverConnectionFactory {
    shared: Arc<FailoverShared>,
}

struct FailoverShared {
    name: String,
    delegates: Vec<Arc<dyn ConnectionFactory>>,
    /// Sticky cursor: index of the last delegate that produced a
    /// connection, persisted across independent `get_connection` calls.
    cursor: Mutex<usize>,
    publisher: RwLock<Option<Arc<dyn EventPublisher>>>,
}

impl FailoverConnectionFactory {
    /// Wrap `delegates` in construction order. Panics on an empty list;
    /// a failover factory with nothing to fail over to is a wiring bug.
    pub fn new(name: impl Into<String>, delegates: Vec<Arc<dyn ConnectionFactory>>) -> Self {
        assert!(
            !delegates.is_empty(),
            "FailoverConnectionFactory requires at least one delegate"
        );
        Self {
            shared: Arc::new(FailoverShared {
                name: name.into(),
                delegates,
                cursor: Mutex::new(0),
                publisher: RwLock::new(None),
            }),
        }
    }

    pub fn set_event_publisher(&self, publisher: Arc<dyn EventPublisher>) {
        *self
            .shared
            .publisher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(publisher);
    }

    pub fn delegate_count(&self) -> usize {
        self.shared.delegates.len()
    }

    /// Current cursor position, exposed for diagnostics.
    pub fn cursor(&self) -> usize {
        *self
            .shared
            .cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl FailoverShared {
    fn cursor_position(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_success(&self, index: usize) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = index;
    }

    fn publish(&self, event: ConnectionEvent) {
        let publisher = self
            .publisher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(publisher) = publisher {
            publisher.publish(event);
        }
    }

    /// Scan the delegates starting at `start`, wrapping around the list.
    ///
    /// Inactive delegates are skipped. The scan visits N+1 slots, so the
    /// starting delegate is revisited once after a complete wrap; a
    /// delegate that recovers while the others are being tried still gets
    /// its second chance within a single scan.
    async fn find_connection(
        &self,
        start: usize,
    ) -> Result<(Arc<dyn Connection>, usize), ConnectionError> {
        let n = self.delegates.len();
        let mut last_err: Option<ConnectionError> = None;

        for offset in 0..=n {
            let index = (start + offset) % n;
            let delegate = &self.delegates[index];
            if !delegate.is_active() {
                debug!(
                    factory = %self.name,
                    delegate = %delegate.factory_name(),
                    "skipping inactive delegate"
                );
                continue;
            }
            match delegate.get_connection().await {
                Ok(conn) => {
                    self.record_success(index);
                    debug!(
                        factory = %self.name,
                        delegate = %delegate.factory_name(),
                        connection_id = %conn.connection_id(),
                        "acquired delegate connection"
                    );
                    return Ok((Arc::from(conn), index));
                }
                Err(e) => {
                    warn!(
                        factory = %self.name,
                        delegate = %delegate.factory_name(),
                        error = %e,
                        "delegate failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        self.publish(ConnectionEvent::AllDelegatesFailed {
            factory: self.name.clone(),
        });
        let cause = last_err.unwrap_or_else(|| ConnectionError::NotStarted(self.name.clone()));
        Err(ConnectionError::AllDelegatesFailed(Box::new(cause)))
    }
}

#[async_trait]
impl ConnectionFactory for FailoverConnectionFactory {
    async fn get_connection(&self) -> Result<Box<dyn Connection>, ConnectionError> {
        let start = self.shared.cursor_position();
        let (conn, index) = self.shared.find_connection(start).await?;
        Ok(Box::new(FailoverConnection {
            shared: Arc::clone(&self.shared),
            current: Mutex::new(Held { conn, index }),
        }))
    }

    fn is_active(&self) -> bool {
        self.shared.delegates.iter().any(|d| d.is_active())
    }

    async fn start(&self) {
        for delegate in &self.shared.delegates {
            delegate.start().await;
        }
        info!(
            factory = %self.shared.name,
            delegates = self.shared.delegates.len(),
            "started"
        );
    }

    async fn stop(&self) {
        for delegate in &self.shared.delegates {
            delegate.stop().await;
        }
        info!(factory = %self.shared.name, "stopped");
    }

    fn register_listener(&self, listener: Arc<dyn ConnectionListener>) {
        for delegate in &self.shared.delegates {
            delegate.register_listener(Arc::clone(&listener));
        }
    }

    fn set_single_use(&self, single_use: bool) {
        for delegate in &self.shared.delegates {
            delegate.set_single_use(single_use);
        }
    }

    fn is_single_use(&self) -> bool {
        self.shared.delegates.iter().all(|d| d.is_single_use())
    }

    fn factory_name(&self) -> &str {
        &self.shared.name
    }
}

struct Held {
    conn: Arc<dyn Connection>,
    index: usize,
}

/// The retry engine handed to callers of the failover factory.
pub struct FailoverConnection {
    shared: Arc<FailoverShared>,
    current: Mutex<Held>,
}

impl FailoverConnection {
    fn held(&self) -> (Arc<dyn Connection>, usize) {
        let held = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&held.conn), held.index)
    }

    fn swap(&self, conn: Arc<dyn Connection>, index: usize) {
        let mut held = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.conn = conn;
        held.index = index;
    }
}

#[async_trait]
impl Connection for FailoverConnection {
    /// Try the held delegate connection; on a transport failure, discard
    /// it and re-acquire starting from the next delegate, retrying the
    /// send. Attempts are bounded at N+1 so a delegate that failed at the
    /// start of the sequence is retried once after a full wrap.
    async fn send(&self, message: &Message) -> Result<(), ConnectionError> {
        let n = self.shared.delegates.len();
        let (mut conn, mut index) = self.held();
        let mut attempts = 0;

        loop {
            match conn.send(message).await {
                Ok(()) => {
                    self.swap(conn, index);
                    return Ok(());
                }
                Err(err) => {
                    attempts += 1;
                    warn!(
                        factory = %self.shared.name,
                        delegate_index = index,
                        attempts,
                        error = %err,
                        "send failed, failing over"
                    );
                    conn.close().await;
                    if attempts > n {
                        self.shared.publish(ConnectionEvent::AllDelegatesFailed {
                            factory: self.shared.name.clone(),
                        });
                        return Err(ConnectionError::AllDelegatesFailed(Box::new(err)));
                    }
                    let (next, next_index) =
                        self.shared.find_connection((index + 1) % n).await?;
                    conn = next;
                    index = next_index;
                }
            }
        }
    }

    async fn close(&self) {
        // Pool-aware when the delegate is a caching factory product.
        let (conn, _) = self.held();
        conn.close().await;
    }

    fn is_open(&self) -> bool {
        let (conn, _) = self.held();
        conn.is_open()
    }

    fn connection_id(&self) -> String {
        let (conn, _) = self.held();
        conn.connection_id()
    }
}
