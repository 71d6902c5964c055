use crate::errors::ScanError;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Bounded hand-off between a producer that must never block and a single consumer.
///
/// At capacity the oldest item is discarded and counted.
pub struct FrameMailbox<T> {
    inner: Mutex<MailboxInner<T>>,
    cv: Condvar,
}

struct MailboxInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

impl<T> FrameMailbox<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MailboxInner {
                items: VecDeque::with_capacity(capacity.clamp(1, 1024)),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MailboxInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue, evicting the oldest item when full. Returns false once closed.
    pub fn push_drop_oldest(&self, item: T) -> bool {
        let mut g = self.lock();
        if g.closed {
            return false;
        }

        if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.items.push_back(item);
        self.cv.notify_one();
        true
    }

    /// Wait up to `timeout` for an item. Errors once closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, ScanError> {
        let mut g = self.lock();

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = g.items.pop_front() {
                return Ok(Some(item));
            }
            if g.closed {
                return Err(ScanError::Pipeline("frame mailbox closed".to_string()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (ng, _) = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            g = ng;
        }
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        self.cv.notify_all();
    }
}
