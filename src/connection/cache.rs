//! Connection caching over a single delegate factory.
//!
//! Wraps one [`ConnectionFactory`] with a bounded reuse pool: closing a
//! pooled connection returns the physical connection to the idle set
//! instead of tearing down the transport, and the next acquisition hands
//! it back out. Send failures are surfaced unretried - retry policy
//! belongs to the failover layer, this layer only stops pooling the
//! broken connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Connection, ConnectionError, ConnectionFactory, ConnectionListener};
use crate::message::Message;
use crate::pool::{BoundedPool, PoolGuard};
use async_trait::async_trait;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded reuse pool around one delegate [`ConnectionFactory`].
pub struct CachingConnectionFactory {
    name: String,
    delegate: Arc<dyn ConnectionFactory>,
    pool: Arc<BoundedPool<Arc<dyn Connection>>>,
    acquire_timeout: Duration,
    active: AtomicBool,
}

impl CachingConnectionFactory {
    /// Wrap `delegate` with an idle pool of at most `capacity` connections.
    pub fn new(delegate: Arc<dyn ConnectionFactory>, capacity: usize) -> Self {
        let name = format!("cache:{}", delegate.factory_name());
        Self {
            name,
            delegate,
            pool: Arc::new(BoundedPool::new(capacity)),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            active: AtomicBool::new(false),
        }
    }

    /// How long `get_connection` may block waiting for a pool slot.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Connections currently available for reuse.
    pub async fn idle_count(&self) -> usize {
        self.pool.idle_count().await
    }

    /// Connections currently held by callers.
    pub fn checked_out(&self) -> usize {
        self.pool.checked_out()
    }
}

#[async_trait]
impl ConnectionFactory for CachingConnectionFactory {
    async fn get_connection(&self) -> Result<Box<dyn Connection>, ConnectionError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotStarted(self.name.clone()));
        }

        let started = Instant::now();
        let Some(guard) = self.pool.acquire(self.acquire_timeout).await else {
            warn!(
                factory = %self.name,
                waited_ms = started.elapsed().as_millis() as u64,
                "pool exhausted"
            );
            return Err(ConnectionError::PoolExhausted {
                factory: self.name.clone(),
                waited_ms: started.elapsed().as_millis() as u64,
            });
        };

        // Reuse the most recently returned idle connection that is still
        // open; anything stale (peer closed, prior I/O error) is discarded.
        while let Some(conn) = self.pool.pop_idle().await {
            if conn.is_open() {
                debug!(
                    factory = %self.name,
                    connection_id = %conn.connection_id(),
                    "reusing pooled connection"
                );
                return Ok(Box::new(PooledConnection::checked_out(
                    conn,
                    guard,
                    Arc::clone(&self.pool),
                    self.name.clone(),
                )));
            }
            debug!(
                factory = %self.name,
                connection_id = %conn.connection_id(),
                "discarding stale pooled connection"
            );
            conn.close().await;
        }

        // Nothing idle; the held slot authorizes one fresh connection.
        let conn: Arc<dyn Connection> = Arc::from(self.delegate.get_connection().await?);
        debug!(
            factory = %self.name,
            connection_id = %conn.connection_id(),
            "created pooled connection"
        );
        Ok(Box::new(PooledConnection::checked_out(
            conn,
            guard,
            Arc::clone(&self.pool),
            self.name.clone(),
        )))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.delegate.is_active()
    }

    async fn start(&self) {
        self.delegate.start().await;
        self.active.store(true, Ordering::SeqCst);
        info!(factory = %self.name, capacity = self.pool.capacity(), "started");
    }

    async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        let idle = self.pool.drain_idle().await;
        let closed = idle.len();
        for conn in idle {
            conn.close().await;
        }
        self.delegate.stop().await;
        info!(factory = %self.name, closed_idle = closed, "stopped");
    }

    fn register_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.delegate.register_listener(listener);
    }

    fn set_single_use(&self, single_use: bool) {
        // Pooling is the whole point of this wrapper; a single-use caching
        // factory would discard everything it caches.
        if single_use {
            warn!(factory = %self.name, "single-use requested on a caching factory, ignored");
            return;
        }
        self.delegate.set_single_use(false);
    }

    fn is_single_use(&self) -> bool {
        false
    }

    fn factory_name(&self) -> &str {
        &self.name
    }
}

/// One checked-out pooled connection.
///
/// `close` returns the physical connection to the idle set when it is
/// still open, discards it otherwise, and is idempotent either way: the
/// checked-out slot is released exactly once.
pub struct PooledConnection {
    id: String,
    factory: String,
    inner: Mutex<Option<CheckedOut>>,
}

struct CheckedOut {
    conn: Arc<dyn Connection>,
    pool: Arc<BoundedPool<Arc<dyn Connection>>>,
    guard: PoolGuard,
}

impl PooledConnection {
    fn checked_out(
        conn: Arc<dyn Connection>,
        guard: PoolGuard,
        pool: Arc<BoundedPool<Arc<dyn Connection>>>,
        factory: String,
    ) -> Self {
        Self {
            id: conn.connection_id(),
            factory,
            inner: Mutex::new(Some(CheckedOut { conn, pool, guard })),
        }
    }

    fn take(&self) -> Option<CheckedOut> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn current(&self) -> Option<Arc<dyn Connection>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|checked| Arc::clone(&checked.conn))
    }
}

#[async_trait]
impl Connection for PooledConnection {
    async fn send(&self, message: &Message) -> Result<(), ConnectionError> {
        let Some(conn) = self.current() else {
            return Err(ConnectionError::SendFailure {
                connection_id: self.id.clone(),
                reason: "connection already released to pool".to_string(),
            });
        };
        // No retry here: a failure marks the underlying connection
        // not-open so close() discards it instead of pooling it.
        conn.send(message).await
    }

    async fn close(&self) {
        let Some(CheckedOut { conn, pool, guard }) = self.take() else {
            return;
        };
        if conn.is_open() {
            debug!(
                factory = %self.factory,
                connection_id = %self.id,
                "returning connection to pool"
            );
            pool.push_idle(conn).await;
        } else {
            debug!(
                factory = %self.factory,
                connection_id = %self.id,
                "discarding closed connection"
            );
            conn.close().await;
        }
        // Slot freed here; a blocked acquirer may now proceed.
        drop(guard);
    }

    fn is_open(&self) -> bool {
        self.current().map(|conn| conn.is_open()).unwrap_or(false)
    }

    fn connection_id(&self) -> String {
        self.id.clone()
    }
}
