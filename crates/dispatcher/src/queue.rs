//! RequestQueue - bounded FIFO shared by producers and the scheduler
//!
//! Backed by a multi-producer multi-consumer bounded channel, so every
//! enqueue/dequeue is atomic and all actors observe one FIFO order.

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::fmt;

/// Enqueue failure; always hands the item back
pub enum QueueError<T> {
    /// Queue at capacity (non-blocking enqueue only)
    Full(T),
    /// Queue closed
    Closed(T),
}

impl<T> QueueError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("queue is full"),
            Self::Closed(_) => f.write_str("queue is closed"),
        }
    }
}

impl<T> std::error::Error for QueueError<T> {}

/// Bounded blocking FIFO queue
pub struct RequestQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> Clone for RequestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> RequestQueue<T> {
    /// Create a queue with a fixed capacity
    ///
    /// Returns `None` for a zero capacity.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let (tx, rx) = bounded(capacity);
        Some(Self { tx, rx, capacity })
    }

    /// Insert at the tail, waiting while the queue is full
    pub async fn enqueue(&self, item: T) -> Result<(), QueueError<T>> {
        self.tx.send(item).await.map_err(|e| QueueError::Closed(e.0))
    }

    /// Insert at the tail without waiting
    pub fn try_enqueue(&self, item: T) -> Result<(), QueueError<T>> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => QueueError::Full(item),
            TrySendError::Closed(item) => QueueError::Closed(item),
        })
    }

    /// Remove the oldest item, waiting while the queue is empty
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn dequeue(&self) -> Option<T> {
        self.rx.recv().await.ok()
    }

    /// Remove the oldest item without waiting
    pub fn try_dequeue(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Stop accepting new items; queued items stay dequeueable
    ///
    /// Returns true if this call closed the queue.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no items are queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
