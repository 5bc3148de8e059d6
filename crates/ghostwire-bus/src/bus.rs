//! Topic-addressed message bus
//!
//! Many producers append to a topic concurrently; exactly one consumption
//! loop drains it once a handler is subscribed. Topics run independently.

use crate::error::{BusError, HandlerFailure};
use crate::message::{QueueMessage, QueueMessageId, RetryDecision};
use crate::retry::{RetryPolicy, RetryScheduler};
use crate::topic::TopicQueue;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Attempt ceiling used when callers do not pass one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Consumer of one topic's messages
#[async_trait::async_trait]
pub trait TopicHandler<T>: Send + Sync {
    /// Handle one payload. A retryable `Err` counts as a failed attempt; a
    /// rejection retires the message without retry.
    async fn handle(&self, payload: T) -> Result<(), HandlerFailure>;
}

#[async_trait::async_trait]
impl<T, F, Fut> TopicHandler<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerFailure>> + Send + 'static,
{
    async fn handle(&self, payload: T) -> Result<(), HandlerFailure> {
        (self)(payload).await
    }
}

/// Observable queue lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// Message appended to a topic
    Published { topic: String, id: QueueMessageId },
    /// Handler succeeded; message discarded
    Processed { topic: String, id: QueueMessageId },
    /// Handler failed; message requeued at the tail
    Retrying {
        topic: String,
        id: QueueMessageId,
        attempts: u32,
    },
    /// Retry budget exhausted; message retired
    Failed {
        topic: String,
        id: QueueMessageId,
        attempts: u32,
        error: String,
    },
    /// Handler rejected the message; retired without retry
    Rejected {
        topic: String,
        id: QueueMessageId,
        error: String,
    },
    /// Topic queue emptied by a caller
    Cleared { topic: String, dropped: usize },
}

/// Bus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Messages accepted by `publish`
    pub published: u64,
    /// Successful handler invocations
    pub processed: u64,
    /// Requeues after a failed attempt
    pub retried: u64,
    /// Messages retired after exhausting their budget
    pub failed: u64,
    /// Messages retired on a non-retryable failure
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    processed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// State shared between the bus handle and its consumer tasks
struct BusShared {
    running: AtomicBool,
    events: broadcast::Sender<BusEvent>,
    counters: Counters,
    scheduler: RetryScheduler,
}

impl BusShared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn emit(&self, event: BusEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Per-topic FIFO message bus with bounded retry
///
/// Must be used from within a Tokio runtime: `subscribe` spawns the topic's
/// consumption loop.
pub struct MessageBus<T> {
    topics: DashMap<String, Arc<TopicQueue<T>>>,
    shared: Arc<BusShared>,
    consumers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for MessageBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("topics", &self.topics.len())
            .field("running", &self.shared.is_running())
            .field("retry_policy", &self.shared.scheduler.policy())
            .finish()
    }
}

impl<T> MessageBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create bus with immediate requeue on failure
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RetryPolicy::default(), DEFAULT_EVENT_CAPACITY)
    }

    /// Create bus with a retry policy
    #[inline]
    #[must_use]
    pub fn with_retry_policy(policy: RetryPolicy) -> Self {
        Self::with_options(policy, DEFAULT_EVENT_CAPACITY)
    }

    /// Create bus with a retry policy and event channel capacity
    #[must_use]
    pub fn with_options(policy: RetryPolicy, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            topics: DashMap::new(),
            shared: Arc::new(BusShared {
                running: AtomicBool::new(true),
                events,
                counters: Counters::default(),
                scheduler: RetryScheduler::new(policy),
            }),
            consumers: Mutex::new(HashMap::new()),
        }
    }

    /// Append a payload to a topic and return its ID without waiting
    ///
    /// # Errors
    /// - `BusError::EmptyTopic` for an empty topic name
    /// - `BusError::InvalidMaxAttempts` if `max_attempts` is zero
    /// - `BusError::Stopped` after [`MessageBus::stop`]
    pub fn publish(
        &self,
        topic: &str,
        payload: T,
        max_attempts: u32,
    ) -> Result<QueueMessageId, BusError> {
        if topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }
        if !self.shared.is_running() {
            return Err(BusError::Stopped);
        }

        let message = QueueMessage::new(topic, payload, max_attempts)?;
        let id = message.id;
        self.topic(topic).push_back(message);

        self.shared.counters.published.fetch_add(1, Ordering::Relaxed);
        self.shared.emit(BusEvent::Published {
            topic: topic.to_string(),
            id,
        });
        debug!(topic, %id, "Message published");
        Ok(id)
    }

    /// Register the handler for a topic and start its consumer
    ///
    /// Re-subscribing replaces the handler; the existing consumer keeps
    /// running and picks up the new handler on its next message.
    ///
    /// # Errors
    /// - `BusError::EmptyTopic` for an empty topic name
    /// - `BusError::Stopped` after [`MessageBus::stop`]
    pub fn subscribe<H>(&self, topic: &str, handler: H) -> Result<(), BusError>
    where
        H: TopicHandler<T> + 'static,
    {
        self.subscribe_shared(topic, Arc::new(handler))
    }

    /// Register an already shared handler
    ///
    /// # Errors
    /// Same as [`MessageBus::subscribe`].
    pub fn subscribe_shared(
        &self,
        topic: &str,
        handler: Arc<dyn TopicHandler<T>>,
    ) -> Result<(), BusError> {
        if topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }
        if !self.shared.is_running() {
            return Err(BusError::Stopped);
        }

        let queue = self.topic(topic);
        queue.set_handler(handler);
        queue.set_active(true);

        if queue.claim_consumer() {
            let task = tokio::spawn(consume(Arc::clone(&queue), Arc::clone(&self.shared)));
            self.consumers.lock().insert(topic.to_string(), task);
            debug!(topic, "Consumer started");
        }
        Ok(())
    }

    /// Whether a handler is registered for a topic
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|queue| queue.handler().is_some())
    }

    /// Halt one topic's consumer; queued messages stay in place
    pub fn stop_topic(&self, topic: &str) {
        if let Some(queue) = self.topics.get(topic) {
            queue.set_active(false);
            queue.wake();
            debug!(topic, "Topic consumer stopping");
        }
    }

    /// Halt every consumer and wait for in-flight handlers to settle
    ///
    /// After this returns no handler is invoked again. Queued messages are
    /// neither delivered nor removed. Must not be awaited from inside a
    /// topic handler.
    pub async fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);

        for entry in &self.topics {
            entry.value().wake();
        }

        let tasks: Vec<(String, JoinHandle<()>)> = self.consumers.lock().drain().collect();
        for (topic, task) in tasks {
            if let Err(e) = task.await {
                warn!(topic = %topic, error = %e, "Consumer task ended abnormally");
            }
        }

        self.shared.scheduler.cancel_all();

        if was_running {
            info!(topics = self.topics.len(), "Message bus stopped");
        }
    }

    /// Whether the bus still accepts and delivers messages
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Messages waiting in a topic
    #[must_use]
    pub fn queue_len(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |queue| queue.len())
    }

    /// Whether a topic currently has a live consumer
    #[must_use]
    pub fn is_consuming(&self, topic: &str) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|queue| queue.is_consuming())
    }

    /// Drop every waiting message in a topic
    pub fn clear(&self, topic: &str) -> usize {
        let dropped = self.topics.get(topic).map_or(0, |queue| queue.clear());
        self.shared.emit(BusEvent::Cleared {
            topic: topic.to_string(),
            dropped,
        });
        dropped
    }

    /// Known topic names, sorted
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Subscribe to lifecycle events
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<BusEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let c = &self.shared.counters;
        BusStats {
            published: c.published.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
        }
    }

    /// Retry timing in effect
    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.shared.scheduler.policy()
    }

    /// Messages currently parked on a retry timer
    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.shared.scheduler.pending_count()
    }

    fn topic(&self, name: &str) -> Arc<TopicQueue<T>> {
        Arc::clone(
            self.topics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(TopicQueue::new(name)))
                .value(),
        )
    }
}

impl<T> Default for MessageBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Consumption loop for one topic (runs in its own Tokio task)
async fn consume<T>(queue: Arc<TopicQueue<T>>, shared: Arc<BusShared>)
where
    T: Clone + Send + Sync + 'static,
{
    loop {
        while shared.is_running() && queue.is_active() {
            let Some(handler) = queue.handler() else {
                break;
            };
            let Some(message) = queue.pop_front() else {
                queue.wait_ready().await;
                continue;
            };

            deliver(&queue, &shared, handler.as_ref(), message).await;
            tokio::task::yield_now().await;
        }

        queue.release_consumer();

        // A subscribe racing with stop_topic may have re-activated the topic
        // after this loop decided to exit but before the flag was released.
        if shared.is_running() && queue.is_active() && queue.claim_consumer() {
            continue;
        }
        break;
    }
    debug!(topic = %queue.name(), "Consumer exited");
}

async fn deliver<T>(
    queue: &Arc<TopicQueue<T>>,
    shared: &BusShared,
    handler: &dyn TopicHandler<T>,
    mut message: QueueMessage<T>,
) where
    T: Clone + Send + Sync + 'static,
{
    let topic = queue.name().to_string();
    let id = message.id;

    let outcome = AssertUnwindSafe(handler.handle(message.payload.clone()))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(HandlerFailure::new("handler panicked")));

    match outcome {
        Ok(()) => {
            shared.counters.processed.fetch_add(1, Ordering::Relaxed);
            shared.emit(BusEvent::Processed { topic, id });
        }
        Err(failure) if !failure.is_retryable() => {
            debug!(topic = %topic, %id, error = %failure, "Message rejected");
            shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            shared.emit(BusEvent::Rejected {
                topic,
                id,
                error: failure.to_string(),
            });
        }
        Err(failure) => match message.record_failure() {
            RetryDecision::Requeue => {
                let attempts = message.attempts();
                debug!(topic = %topic, %id, attempts, error = %failure, "Handler failed, requeueing");
                shared.counters.retried.fetch_add(1, Ordering::Relaxed);
                shared.emit(BusEvent::Retrying {
                    topic,
                    id,
                    attempts,
                });
                shared.scheduler.schedule(Arc::clone(queue), message);
            }
            RetryDecision::Retire => {
                let attempts = message.attempts();
                warn!(topic = %topic, %id, attempts, error = %failure, "Message retired after final attempt");
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                shared.emit(BusEvent::Failed {
                    topic,
                    id,
                    attempts,
                    error: failure.to_string(),
                });
            }
        },
    }
}
