//! Agent registry and message routing
//!
//! The orchestrator owns registered agents, drains each agent's outbound
//! channel onto the bus (topic = recipient id), and resolves bus deliveries
//! back to the target agent. Messages addressed to the review channel are
//! broadcast to review subscribers instead.
//!
//! Delivery is best-effort: unknown recipients are logged and dropped.

use crate::agent::{Agent, Dispatch};
use crate::config::OrchestratorConfig;
use crate::error::{AgentError, AgentErrorEvent, ConfigError, ErrorClass};
use crate::event::AgentEvent;
use crate::message::AgentMessage;
use crate::types::{AgentId, Payload};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use ghostwire_bus::{BusError, HandlerFailure, MessageBus, QueueMessageId, TopicHandler};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    ShutDown,
}

type Registry<P> = DashMap<AgentId, Arc<Agent<P>>>;

/// Agent registry plus routing loop
///
/// Single-use: once [`Orchestrator::stop_all`] returns, the instance
/// refuses further registrations, submissions and starts.
pub struct Orchestrator<P: Payload> {
    config: OrchestratorConfig,
    agents: Arc<Registry<P>>,
    bus: Arc<MessageBus<AgentMessage<P>>>,
    router: Arc<RouteHandler<P>>,
    review: broadcast::Sender<AgentMessage<P>>,
    errors: broadcast::Sender<AgentErrorEvent>,
    routing_started: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    phase: Mutex<Phase>,
}

impl<P: Payload> std::fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agents.len())
            .field("phase", &*self.phase.lock())
            .field("bus", &self.bus)
            .finish()
    }
}

impl<P: Payload> Orchestrator<P> {
    /// Create orchestrator from validated config
    ///
    /// # Errors
    /// `ConfigError` if the config is out of range.
    pub fn new(config: OrchestratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: OrchestratorConfig) -> Self {
        let bus = Arc::new(MessageBus::with_options(config.retry, config.event_capacity));
        let (review, _) = broadcast::channel(config.event_capacity);
        let (errors, _) = broadcast::channel(config.event_capacity);
        let agents: Arc<Registry<P>> = Arc::new(DashMap::new());
        let router = Arc::new(RouteHandler {
            agents: Arc::clone(&agents),
            review_channel: config.review_channel.clone(),
            review: review.clone(),
            errors: errors.clone(),
        });

        Self {
            config,
            agents,
            bus,
            router,
            review,
            errors,
            routing_started: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
            phase: Mutex::new(Phase::Idle),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Underlying bus (for inspection)
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &MessageBus<AgentMessage<P>> {
        &self.bus
    }

    /// Register an agent and start draining its outbound channel
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `AgentError::DuplicateAgent` if the id is taken; the first registration stays intact
    /// - `AgentError::ReservedId` for the review channel id
    /// - `AgentError::ChannelClosed` if the agent's outbound channel was already taken
    /// - `AgentError::ShutDown` after `stop_all`
    pub fn register(&self, agent: Agent<P>) -> Result<Arc<Agent<P>>, AgentError> {
        if *self.phase.lock() == Phase::ShutDown {
            return Err(AgentError::ShutDown);
        }

        let id = agent.id().clone();
        if id == self.config.review_channel {
            return Err(AgentError::ReservedId(id));
        }

        let agent = Arc::new(agent);
        let outbound = match self.agents.entry(id.clone()) {
            Entry::Occupied(_) => return Err(AgentError::DuplicateAgent(id)),
            Entry::Vacant(slot) => {
                let outbound = agent
                    .take_outbound()
                    .ok_or_else(|| AgentError::ChannelClosed(id.clone()))?;
                slot.insert(Arc::clone(&agent));
                outbound
            }
        };

        let forwarder = tokio::spawn(forward_outbound(
            id.clone(),
            outbound,
            Arc::clone(&self.bus),
            Arc::clone(&self.router),
            Arc::clone(&self.routing_started),
            self.config.max_attempts,
        ));
        let fan_in = tokio::spawn(forward_errors(agent.subscribe_events(), self.errors.clone()));
        self.tasks.lock().extend([forwarder, fan_in]);

        if self.routing_started.load(Ordering::SeqCst) {
            ensure_route(&self.bus, &self.router, id.as_str());
        }

        info!(agent = %id, name = %agent.name(), capabilities = ?agent.capabilities(), "Agent registered");
        Ok(agent)
    }

    /// Start every registered agent concurrently, then start routing
    ///
    /// Waits for all start hooks to settle. Agents that are already running
    /// are left alone.
    ///
    /// # Errors
    /// The first start failure, reported after every agent has settled;
    /// `AgentError::ShutDown` after `stop_all`.
    pub async fn start_all(&self) -> Result<(), AgentError> {
        {
            let mut phase = self.phase.lock();
            if *phase == Phase::ShutDown {
                return Err(AgentError::ShutDown);
            }
            *phase = Phase::Running;
        }

        let agents = self.snapshot();
        let results = join_all(agents.iter().map(|agent| agent.start())).await;

        self.routing_started.store(true, Ordering::SeqCst);
        ensure_route(&self.bus, &self.router, self.config.review_channel.as_str());
        for agent in &agents {
            ensure_route(&self.bus, &self.router, agent.id().as_str());
        }
        // Topics addressed to unknown ids still need a consumer to drop them
        for topic in self.bus.topics() {
            ensure_route(&self.bus, &self.router, &topic);
        }

        info!(agents = agents.len(), "Orchestrator started");
        first_error(results, |e| matches!(e, AgentError::AlreadyRunning(_)))
    }

    /// Halt routing, then stop every agent concurrently
    ///
    /// After this returns no further delivery is attempted; queued messages
    /// stay queued and are never delivered. Must not be awaited from inside
    /// an agent handler.
    ///
    /// # Errors
    /// The first stop-hook failure, reported after every agent has settled.
    pub async fn stop_all(&self) -> Result<(), AgentError> {
        {
            let mut phase = self.phase.lock();
            if *phase == Phase::ShutDown {
                return Ok(());
            }
            *phase = Phase::ShutDown;
        }

        self.routing_started.store(false, Ordering::SeqCst);
        self.bus.stop().await;

        let agents = self.snapshot();
        let results = join_all(agents.iter().map(|agent| agent.stop())).await;

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        info!(agents = agents.len(), "Orchestrator stopped");
        first_error(results, |_| false)
    }

    /// Enqueue a message for its recipient
    ///
    /// # Errors
    /// `AgentError::ShutDown` after `stop_all`; bus validation errors.
    pub fn submit(&self, message: AgentMessage<P>) -> Result<QueueMessageId, AgentError> {
        if *self.phase.lock() == Phase::ShutDown {
            return Err(AgentError::ShutDown);
        }
        let topic = message.to.to_string();
        let id = self.bus.publish(&topic, message, self.config.max_attempts)?;
        if self.routing_started.load(Ordering::SeqCst) {
            ensure_route(&self.bus, &self.router, &topic);
        }
        Ok(id)
    }

    /// Look up a registered agent
    #[must_use]
    pub fn agent(&self, id: &str) -> Option<Arc<Agent<P>>> {
        self.agents.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.phase.lock() == Phase::Running
    }

    /// Messages addressed to the review channel
    #[must_use]
    pub fn subscribe_review(&self) -> broadcast::Receiver<AgentMessage<P>> {
        self.review.subscribe()
    }

    /// Error events from every registered agent and from routing
    #[must_use]
    pub fn subscribe_errors(&self) -> broadcast::Receiver<AgentErrorEvent> {
        self.errors.subscribe()
    }

    fn snapshot(&self) -> Vec<Arc<Agent<P>>> {
        self.agents.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

impl<P: Payload> Default for Orchestrator<P> {
    fn default() -> Self {
        Self::build(OrchestratorConfig::default())
    }
}

fn first_error(
    results: Vec<Result<(), AgentError>>,
    ignore: impl Fn(&AgentError) -> bool,
) -> Result<(), AgentError> {
    results
        .into_iter()
        .filter_map(Result::err)
        .find(|e| !ignore(e))
        .map_or(Ok(()), Err)
}

fn ensure_route<P: Payload>(
    bus: &MessageBus<AgentMessage<P>>,
    router: &Arc<RouteHandler<P>>,
    topic: &str,
) {
    if bus.is_subscribed(topic) {
        return;
    }
    let handler: Arc<dyn TopicHandler<AgentMessage<P>>> = Arc::clone(router) as _;
    match bus.subscribe_shared(topic, handler) {
        Ok(()) => debug!(topic, "Route installed"),
        Err(BusError::Stopped) => {}
        Err(e) => warn!(topic, error = %e, "Failed to install route"),
    }
}

/// Drain one agent's outbound channel onto the bus
async fn forward_outbound<P: Payload>(
    agent: AgentId,
    mut outbound: mpsc::UnboundedReceiver<AgentMessage<P>>,
    bus: Arc<MessageBus<AgentMessage<P>>>,
    router: Arc<RouteHandler<P>>,
    routing_started: Arc<AtomicBool>,
    max_attempts: u32,
) {
    while let Some(message) = outbound.recv().await {
        let topic = message.to.to_string();
        let id = message.id;
        match bus.publish(&topic, message, max_attempts) {
            Ok(_) => {}
            Err(BusError::Stopped) => {
                debug!(agent = %agent, %id, "Bus stopped; outbound message dropped");
                break;
            }
            Err(e) => {
                warn!(agent = %agent, %id, topic = %topic, error = %e, "Outbound message rejected");
                continue;
            }
        }
        // Publish before checking the flag so start_all either sees the
        // topic or this task sees the flag.
        if routing_started.load(Ordering::SeqCst) {
            ensure_route(&bus, &router, &topic);
        }
    }
    debug!(agent = %agent, "Outbound forwarder exited");
}

/// Relay an agent's error events to the orchestrator-wide error stream
async fn forward_errors(
    mut events: broadcast::Receiver<AgentEvent>,
    errors: broadcast::Sender<AgentErrorEvent>,
) {
    loop {
        match events.recv().await {
            Ok(AgentEvent::Error(event)) => {
                let _ = errors.send(event);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Error relay lagged; events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Bus handler resolving a delivery to its target agent
///
/// Only successful handling counts as processed. Unroutable messages,
/// deliveries to stopped agents and non-retryable handler failures are
/// rejected; retryable failures go back to the bus for another attempt.
struct RouteHandler<P: Payload> {
    agents: Arc<Registry<P>>,
    review_channel: AgentId,
    review: broadcast::Sender<AgentMessage<P>>,
    errors: broadcast::Sender<AgentErrorEvent>,
}

#[async_trait::async_trait]
impl<P: Payload> TopicHandler<AgentMessage<P>> for RouteHandler<P> {
    async fn handle(&self, message: AgentMessage<P>) -> Result<(), HandlerFailure> {
        if message.to == self.review_channel {
            debug!(id = %message.id, from = %message.from, "Review message received");
            let _ = self.review.send(message);
            return Ok(());
        }

        let Some(agent) = self.agents.get(&message.to).map(|e| Arc::clone(e.value())) else {
            warn!(id = %message.id, to = %message.to, from = %message.from, "Unroutable message dropped");
            return Err(HandlerFailure::rejected(format!("no agent {}", message.to)));
        };

        let id = message.id;
        let to = message.to.clone();
        match agent.handle_message(message).await {
            Ok(Dispatch::Failed { retryable }) => {
                let reason = format!("agent {to} failed to handle message {id}");
                if retryable {
                    Err(HandlerFailure::new(reason))
                } else {
                    Err(HandlerFailure::rejected(reason))
                }
            }
            Ok(_) => Ok(()),
            Err(e @ AgentError::NotRunning(_)) => {
                debug!(%id, to = %to, "Delivery to stopped agent dropped");
                let event = AgentErrorEvent::new(to, ErrorClass::NotRunning, e.to_string())
                    .with_context_field("message_id", id.to_string());
                let _ = self.errors.send(event);
                Err(HandlerFailure::rejected(e.to_string()))
            }
            Err(e) => {
                warn!(%id, to = %to, error = %e, "Delivery failed");
                Err(HandlerFailure::rejected(e.to_string()))
            }
        }
    }
}
