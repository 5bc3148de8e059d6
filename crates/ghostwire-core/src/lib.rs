//! Ghostwire Core - agents and the routing orchestrator
//!
//! Provides the agent substrate for the pipeline:
//! - [`Agent`]: lifecycle state machine around an [`AgentBehavior`]
//! - [`AgentMessage`]: typed request/notification/response/error envelope
//! - [`Orchestrator`]: registry, outbound forwarding and bus-backed routing
//! - Structured [`AgentErrorEvent`]s in place of propagated handler errors
//!
//! # Example
//!
//! ```rust,ignore
//! use ghostwire_core::{Agent, AgentIdentity, AgentMessage, Orchestrator, OrchestratorConfig};
//!
//! let orchestrator = Orchestrator::<String>::new(OrchestratorConfig::default())?;
//! orchestrator.register(Agent::new(AgentIdentity::new("echo", "Echo"), EchoBehavior))?;
//! orchestrator.start_all().await?;
//! orchestrator.submit(AgentMessage::request("cli", "echo", "hello".to_string()))?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod types;

pub use agent::{Agent, AgentBehavior, AgentContext, Dispatch};
pub use config::OrchestratorConfig;
pub use error::{AgentError, AgentErrorEvent, ConfigError, ErrorClass, HandlerError};
pub use event::AgentEvent;
pub use memory::AgentMemory;
pub use message::{AgentMessage, MessageBody, MessageId, MessageKind};
pub use orchestrator::Orchestrator;
pub use types::{AgentId, AgentIdentity, AgentState, Payload};

// Re-exported so downstream crates configure retries without a direct bus dependency
pub use ghostwire_bus::{BusEvent, BusStats, QueueMessageId, RetryPolicy};
