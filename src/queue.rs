//! Bounded multi-producer, multi-consumer queue of work items.
//!
//! A full queue blocks producers on `send`; this is the only backpressure
//! signal from workers to producers. Within one producer enqueue order is
//! preserved; nothing is guaranteed across producers. The channel closes
//! only once every sender handle has been dropped, which the supervisor
//! arranges to happen after all producers have returned.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::types::WorkItem;

/// Default queue capacity.
pub const QUEUE_CAPACITY: usize = 25;

/// Creates a bounded work queue with the given capacity.
#[must_use]
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueSender { tx },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer handle to the work queue. Cloned once per producer.
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<WorkItem>,
}

impl QueueSender {
    /// Enqueues one item, suspending while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the queue has been closed; producers treat this
    /// as a shutdown signal and return.
    pub async fn send(&self, item: WorkItem) -> Result<(), QueueClosed> {
        self.tx.send(item).await.map_err(|_| QueueClosed)
    }
}

/// The queue was closed while a producer was still sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// Consumer handle to the work queue, shared by all workers.
#[derive(Clone)]
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

impl QueueReceiver {
    /// Dequeues the next item, suspending while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<WorkItem> {
        self.rx.lock().await.recv().await
    }
}
