//! Per-topic queue state

use crate::bus::TopicHandler;
use crate::message::QueueMessage;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// FIFO queue for one topic
///
/// Producers append without coordination. The `consuming` flag admits at
/// most one consumption loop at a time.
pub(crate) struct TopicQueue<T> {
    name: String,
    messages: Mutex<VecDeque<QueueMessage<T>>>,
    ready: Notify,
    consuming: AtomicBool,
    active: AtomicBool,
    handler: RwLock<Option<Arc<dyn TopicHandler<T>>>>,
}

impl<T> TopicQueue<T> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            consuming: AtomicBool::new(false),
            active: AtomicBool::new(true),
            handler: RwLock::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn push_back(&self, message: QueueMessage<T>) {
        self.messages.lock().push_back(message);
        self.ready.notify_one();
    }

    pub(crate) fn pop_front(&self) -> Option<QueueMessage<T>> {
        self.messages.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut guard = self.messages.lock();
        let dropped = guard.len();
        guard.clear();
        dropped
    }

    /// Wait until a producer (or a stop request) signals the queue
    pub(crate) async fn wait_ready(&self) {
        self.ready.notified().await;
    }

    /// Wake the consumer so it re-checks its run flags
    pub(crate) fn wake(&self) {
        self.ready.notify_one();
    }

    pub(crate) fn set_handler(&self, handler: Arc<dyn TopicHandler<T>>) {
        *self.handler.write() = Some(handler);
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn TopicHandler<T>>> {
        self.handler.read().clone()
    }

    /// Try to become the topic's single consumer
    pub(crate) fn claim_consumer(&self) -> bool {
        self.consuming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_consumer(&self) {
        self.consuming.store(false, Ordering::Release);
    }

    pub(crate) fn is_consuming(&self) -> bool {
        self.consuming.load(Ordering::Acquire)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_consumer_can_claim() {
        let queue: TopicQueue<()> = TopicQueue::new("t");
        assert!(queue.claim_consumer());
        assert!(!queue.claim_consumer());
        queue.release_consumer();
        assert!(queue.claim_consumer());
    }

    #[test]
    fn fifo_order() {
        let queue = TopicQueue::new("t");
        for i in 0..3u8 {
            queue.push_back(QueueMessage::new("t", i, 1).unwrap());
        }
        let order: Vec<u8> = std::iter::from_fn(|| queue.pop_front().map(|m| m.payload)).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
