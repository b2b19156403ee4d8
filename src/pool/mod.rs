//! Bounded idle-item pool with timed acquisition.
//!
//! The pool hands out capacity slots, not items: `acquire` waits (bounded)
//! for one of `capacity` slots, after which the caller either takes an idle
//! item or creates a fresh one. The slot is held for the whole checked-out
//! lifetime and freed by dropping the [`PoolGuard`]; returning the item to
//! the idle set beforehand makes it available to the next acquirer.
//!
//! Invariant: an item is idle-in-pool, checked-out (guard held), or
//! discarded - never more than one at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// A held capacity slot. Dropping it frees the slot for the next acquirer.
pub struct PoolGuard {
    _permit: OwnedSemaphorePermit,
}

pub struct BoundedPool<T> {
    capacity: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<T>>,
}

impl<T> BoundedPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a capacity slot, bounded by `timeout`. `None` means the
    /// timeout elapsed with the pool still at capacity.
    pub async fn acquire(&self, timeout: Duration) -> Option<PoolGuard> {
        let acquired =
            tokio::time::timeout(timeout, Arc::clone(&self.permits).acquire_owned()).await;
        match acquired {
            // The semaphore is never closed, so the inner error cannot
            // occur; treat it like a timeout rather than panicking.
            Ok(Ok(permit)) => Some(PoolGuard { _permit: permit }),
            _ => None,
        }
    }

    /// Take one idle item, most recently returned first.
    pub async fn pop_idle(&self) -> Option<T> {
        self.idle.lock().await.pop()
    }

    /// Return a checked-out item to the idle set. The caller still holds
    /// the guard; dropping it afterwards wakes any waiter.
    pub async fn push_idle(&self, item: T) {
        self.idle.lock().await.push(item);
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// Slots currently held by checked-out items or in-flight acquirers.
    pub fn checked_out(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Remove and return every idle item (used when stopping a factory).
    pub async fn drain_idle(&self) -> Vec<T> {
        std::mem::take(&mut *self.idle.lock().await)
    }
}
