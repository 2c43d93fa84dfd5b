//! The bounded input queue owned by every stage.
//!
//! Capacity is a semaphore: a producer takes a permit before its item is
//! enqueued and the permit travels with the item through the worker, so a
//! slot only frees up once the worker has finished with (and forwarded) the
//! item. A full queue therefore suspends `push` until downstream progress is
//! made, which is what carries backpressure upstream.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// How many items a stage may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// At most this many items queued or in flight
    Bounded(usize),
    /// No limit; `submit` never suspends
    Unbounded,
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Bounded(n) => write!(f, "{}", n),
            Capacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A queued item plus the capacity permit it holds.
pub(crate) struct Slot<T> {
    item: T,
    permit: Option<OwnedSemaphorePermit>,
}

impl<T> Slot<T> {
    /// Split into the item and its permit. Dropping the permit frees the slot.
    pub(crate) fn into_parts(self) -> (T, Option<OwnedSemaphorePermit>) {
        (self.item, self.permit)
    }
}

struct Inner<T> {
    items: VecDeque<Slot<T>>,
    closed: bool,
}

pub(crate) struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Notify,
    permits: Option<Arc<Semaphore>>,
}

impl<T> BoundedQueue<T> {
    pub(crate) fn new(capacity: Capacity) -> Self {
        let permits = match capacity {
            Capacity::Bounded(n) => Some(Arc::new(Semaphore::new(n))),
            Capacity::Unbounded => None,
        };
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
            permits,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item, waiting for capacity if the queue is full.
    ///
    /// Hands the item back if the queue is closed, either before the call
    /// or while it was waiting.
    pub(crate) async fn push(&self, item: T) -> Result<(), T> {
        let permit = match &self.permits {
            Some(permits) => match permits.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return Err(item),
            },
            None => None,
        };

        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(item);
            }
            inner.items.push_back(Slot { item, permit });
        }
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue the next item, waiting if the queue is empty.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub(crate) async fn pop(&self) -> Option<Slot<T>> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if let Some(slot) = inner.items.pop_front() {
                    return Some(slot);
                }
                if inner.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stop accepting items. Queued items remain available to `pop`, and
    /// producers waiting for capacity are released with their item.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        if let Some(permits) = &self.permits {
            permits.close();
        }
        self.available.notify_waiters();
    }

    /// Close the queue and drop everything still in it, returning how many
    /// items were discarded.
    pub(crate) fn discard(&self) -> usize {
        let dropped: Vec<Slot<T>> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.items.drain(..).collect()
        };
        if let Some(permits) = &self.permits {
            permits.close();
        }
        self.available.notify_waiters();
        dropped.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
