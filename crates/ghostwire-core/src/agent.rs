//! Agent lifecycle and message dispatch
//!
//! An [`Agent`] wraps an [`AgentBehavior`] with:
//! - The lifecycle state machine (`Stopped -> Starting -> Running -> Stopping`)
//! - An owned outbound channel the orchestrator drains
//! - Private memory and an event stream for observers
//!
//! Handler failures never propagate out of [`Agent::handle_message`]; they
//! become [`AgentErrorEvent`]s on the agent's event stream.

use crate::error::{AgentError, AgentErrorEvent, ErrorClass, HandlerError};
use crate::event::AgentEvent;
use crate::lifecycle::validate_transition;
use crate::memory::AgentMemory;
use crate::message::{AgentMessage, MessageBody, MessageId};
use crate::types::{AgentId, AgentIdentity, AgentState, Payload};
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Capability set of an agent
///
/// Only `on_request` is required; the other hooks default to no-ops.
#[async_trait]
pub trait AgentBehavior<P: Payload>: Send + Sync + 'static {
    /// Runs before the agent enters `Running`
    async fn on_start(&self, _ctx: &AgentContext<P>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Runs before the agent returns to `Stopped`
    async fn on_stop(&self, _ctx: &AgentContext<P>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Handle a request
    async fn on_request(
        &self,
        ctx: &AgentContext<P>,
        from: &AgentId,
        payload: &P,
    ) -> Result<(), HandlerError>;

    /// Handle a notification
    async fn on_notification(
        &self,
        ctx: &AgentContext<P>,
        from: &AgentId,
        _payload: &P,
    ) -> Result<(), HandlerError> {
        debug!(agent = %ctx.id(), from = %from, "Notification ignored");
        Ok(())
    }

    /// Tool name reported on error events
    fn tool_name(&self) -> Option<&str> {
        None
    }

    /// Extra context attached to error events for a failed message
    fn failure_context(&self, _message: &AgentMessage<P>) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// What `handle_message` did with a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handler ran and succeeded
    Handled,
    /// Kind has no handler; dropped
    Ignored,
    /// Handler failed; an error event was emitted
    Failed { retryable: bool },
}

/// Handle passed to behaviour hooks
///
/// Gives access to the agent's id, memory and outbound channel.
#[derive(Debug)]
pub struct AgentContext<P> {
    id: AgentId,
    outbound: mpsc::UnboundedSender<AgentMessage<P>>,
    events: broadcast::Sender<AgentEvent>,
    memory: AgentMemory,
}

impl<P: Payload> AgentContext<P> {
    #[inline]
    #[must_use]
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    /// Emit an outbound message
    ///
    /// The message is queued on the agent's outbound channel; delivery is
    /// up to whoever drains it.
    ///
    /// # Errors
    /// `AgentError::ChannelClosed` if the outbound receiver was dropped.
    pub fn send(&self, message: AgentMessage<P>) -> Result<MessageId, AgentError> {
        let id = message.id;
        let to = message.to.clone();
        let kind = message.kind();
        self.outbound
            .send(message)
            .map_err(|_| AgentError::ChannelClosed(self.id.clone()))?;

        self.emit(AgentEvent::MessageSent {
            agent_id: self.id.clone(),
            message_id: id,
            to,
            kind,
        });
        Ok(id)
    }

    /// Send a request to another agent
    ///
    /// # Errors
    /// See [`AgentContext::send`].
    pub fn request(&self, to: impl Into<AgentId>, payload: P) -> Result<MessageId, AgentError> {
        self.send(AgentMessage::request(self.id.clone(), to, payload))
    }

    /// Send a notification to another agent
    ///
    /// # Errors
    /// See [`AgentContext::send`].
    pub fn notify(&self, to: impl Into<AgentId>, payload: P) -> Result<MessageId, AgentError> {
        self.send(AgentMessage::notification(self.id.clone(), to, payload))
    }

    /// Publish an error event without failing the current handler
    pub fn report_error(&self, event: AgentErrorEvent) {
        self.emit(AgentEvent::Error(event));
    }

    fn emit(&self, event: AgentEvent) {
        let _ = self.events.send(event);
    }
}

/// Lifecycle-managed worker
pub struct Agent<P: Payload> {
    identity: AgentIdentity,
    state: RwLock<AgentState>,
    behavior: Arc<dyn AgentBehavior<P>>,
    context: AgentContext<P>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<AgentMessage<P>>>>,
    // Serializes start/stop so hooks never overlap
    lifecycle: tokio::sync::Mutex<()>,
}

impl<P: Payload> std::fmt::Debug for Agent<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl<P: Payload> Agent<P> {
    /// Create agent in `Stopped`
    #[must_use]
    pub fn new<B>(identity: AgentIdentity, behavior: B) -> Self
    where
        B: AgentBehavior<P>,
    {
        Self::from_shared(identity, Arc::new(behavior))
    }

    /// Create agent around an already shared behaviour
    #[must_use]
    pub fn from_shared(identity: AgentIdentity, behavior: Arc<dyn AgentBehavior<P>>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let context = AgentContext {
            id: identity.id.clone(),
            outbound,
            memory: AgentMemory::new(identity.id.clone(), events.clone()),
            events,
        };
        Self {
            identity,
            state: RwLock::new(AgentState::Stopped),
            behavior,
            context,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &AgentId {
        &self.identity.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.identity.capabilities
    }

    #[inline]
    #[must_use]
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().accepts_messages()
    }

    #[inline]
    #[must_use]
    pub fn memory(&self) -> &AgentMemory {
        self.context.memory()
    }

    /// Behaviour-facing handle (for sending outside a handler)
    #[inline]
    #[must_use]
    pub fn context(&self) -> &AgentContext<P> {
        &self.context
    }

    /// Subscribe to this agent's events
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<AgentEvent> {
        self.context.events.subscribe()
    }

    /// Take the outbound receiver; only the first call gets it
    pub fn take_outbound(&self) -> Option<mpsc::UnboundedReceiver<AgentMessage<P>>> {
        self.outbound_rx.lock().take()
    }

    /// Run the start hook and enter `Running`
    ///
    /// # Errors
    /// - `AgentError::AlreadyRunning` unless the agent is `Stopped`
    /// - `AgentError::LifecycleHook` if the hook fails; the agent is back in `Stopped`
    pub async fn start(&self) -> Result<(), AgentError> {
        let _guard = self.lifecycle.lock().await;

        if self.state() != AgentState::Stopped {
            return Err(AgentError::AlreadyRunning(self.id().clone()));
        }
        self.transition(AgentState::Starting)?;

        match guarded(self.behavior.on_start(&self.context)).await {
            Ok(()) => {
                self.transition(AgentState::Running)?;
                self.context.emit(AgentEvent::Started {
                    agent_id: self.id().clone(),
                });
                info!(agent = %self.id(), name = %self.name(), "Agent started");
                Ok(())
            }
            Err((_, reason)) => {
                self.transition(AgentState::Stopped)?;
                warn!(agent = %self.id(), reason = %reason, "Start hook failed");
                Err(AgentError::LifecycleHook {
                    agent: self.id().clone(),
                    hook: "start",
                    reason,
                })
            }
        }
    }

    /// Run the stop hook and return to `Stopped`
    ///
    /// No-op when already stopped. The agent ends in `Stopped` even if the
    /// hook fails.
    ///
    /// # Errors
    /// `AgentError::LifecycleHook` if the stop hook failed.
    pub async fn stop(&self) -> Result<(), AgentError> {
        let _guard = self.lifecycle.lock().await;

        if self.state() == AgentState::Stopped {
            return Ok(());
        }
        self.transition(AgentState::Stopping)?;

        let hook = guarded(self.behavior.on_stop(&self.context)).await;
        self.transition(AgentState::Stopped)?;
        self.context.emit(AgentEvent::Stopped {
            agent_id: self.id().clone(),
        });

        match hook {
            Ok(()) => {
                info!(agent = %self.id(), "Agent stopped");
                Ok(())
            }
            Err((_, reason)) => {
                warn!(agent = %self.id(), reason = %reason, "Stop hook failed");
                Err(AgentError::LifecycleHook {
                    agent: self.id().clone(),
                    hook: "stop",
                    reason,
                })
            }
        }
    }

    /// Dispatch one delivered message
    ///
    /// Requests go to `on_request`, notifications to `on_notification`;
    /// other kinds are dropped. A failing or panicking handler yields
    /// `Dispatch::Failed` plus an error event, never an `Err`.
    ///
    /// # Errors
    /// `AgentError::NotRunning` unless the agent is `Running`.
    pub async fn handle_message(&self, message: AgentMessage<P>) -> Result<Dispatch, AgentError> {
        if !self.is_running() {
            return Err(AgentError::NotRunning(self.id().clone()));
        }

        self.context.emit(AgentEvent::MessageReceived {
            agent_id: self.id().clone(),
            message_id: message.id,
            from: message.from.clone(),
            kind: message.kind(),
        });

        let ctx = &self.context;
        let outcome = match &message.body {
            MessageBody::Request(payload) => {
                guarded(self.behavior.on_request(ctx, &message.from, payload)).await
            }
            MessageBody::Notification(payload) => {
                guarded(self.behavior.on_notification(ctx, &message.from, payload)).await
            }
            MessageBody::Response(_) | MessageBody::Error(_) => {
                debug!(agent = %self.id(), kind = ?message.kind(), id = %message.id, "Unhandled message kind dropped");
                return Ok(Dispatch::Ignored);
            }
        };

        match outcome {
            Ok(()) => Ok(Dispatch::Handled),
            Err((class, error)) => {
                let event = AgentErrorEvent::new(self.id().clone(), class, error)
                    .with_tool(self.behavior.tool_name().map(str::to_string))
                    .with_context(self.behavior.failure_context(&message))
                    .with_context_field("message_id", message.id.to_string())
                    .with_context_field("from", message.from.to_string());
                let retryable = event.retryable;

                warn!(
                    agent = %self.id(),
                    id = %message.id,
                    class = ?class,
                    error = %event.error,
                    "Handler failed"
                );
                self.context.emit(AgentEvent::Error(event));
                Ok(Dispatch::Failed { retryable })
            }
        }
    }

    fn transition(&self, to: AgentState) -> Result<(), AgentError> {
        let mut state = self.state.write();
        validate_transition(self.id(), *state, to)?;
        debug!(agent = %self.id(), from = ?*state, to = ?to, "State transition");
        *state = to;
        Ok(())
    }
}

/// Run a hook, turning errors and panics into `(class, description)`
async fn guarded<F>(hook: F) -> Result<(), (ErrorClass, String)>
where
    F: Future<Output = Result<(), HandlerError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err((e.class(), e.to_string())),
        Err(_) => Err((ErrorClass::Panic, "handler panicked".to_string())),
    }
}
