//! Ghostwire Bus - per-topic message queue
//!
//! Provides the delivery substrate for the agent pipeline:
//! - FIFO queue per topic, many producers, one consumer
//! - Bounded retry with requeue-to-tail on handler failure
//! - Configurable retry timing through [`RetryPolicy`]
//! - Lifecycle events and counters for observers
//!
//! Delivery is at-least-once. A retried message moves to the tail of its
//! topic queue, so ordering is only guaranteed for first attempts.
//!
//! # Example
//!
//! ```rust,ignore
//! use ghostwire_bus::{HandlerFailure, MessageBus};
//!
//! let bus = MessageBus::<String>::new();
//! bus.subscribe("greetings", |msg: String| async move {
//!     println!("got {msg}");
//!     Ok::<_, HandlerFailure>(())
//! })?;
//! bus.publish("greetings", "hello".to_string(), 3)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bus;
pub mod error;
pub mod message;
pub mod retry;
mod topic;

pub use bus::{BusEvent, BusStats, MessageBus, TopicHandler, DEFAULT_MAX_ATTEMPTS};
pub use error::{BusError, HandlerFailure};
pub use message::{QueueMessage, QueueMessageId, RetryDecision};
pub use retry::{RetryPolicy, RetryScheduler};
