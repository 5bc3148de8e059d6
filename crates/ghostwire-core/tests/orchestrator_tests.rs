//! Orchestrator routing and lifecycle tests

use async_trait::async_trait;
use ghostwire_core::{
    Agent, AgentBehavior, AgentContext, AgentError, AgentId, AgentIdentity, AgentMessage,
    AgentState, ErrorClass, HandlerError, Orchestrator, OrchestratorConfig,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AgentBehavior<String> for Recorder {
    async fn on_request(
        &self,
        _ctx: &AgentContext<String>,
        _from: &AgentId,
        payload: &String,
    ) -> Result<(), HandlerError> {
        self.seen.lock().push(payload.clone());
        Ok(())
    }

    async fn on_notification(
        &self,
        _ctx: &AgentContext<String>,
        _from: &AgentId,
        payload: &String,
    ) -> Result<(), HandlerError> {
        self.seen.lock().push(format!("note:{payload}"));
        Ok(())
    }
}

struct Relay {
    to: &'static str,
}

#[async_trait]
impl AgentBehavior<String> for Relay {
    async fn on_request(
        &self,
        ctx: &AgentContext<String>,
        _from: &AgentId,
        payload: &String,
    ) -> Result<(), HandlerError> {
        ctx.request(self.to, payload.to_uppercase())
            .map(|_| ())
            .map_err(|e| HandlerError::transient(e.to_string()))
    }
}

struct Failing {
    calls: Arc<AtomicUsize>,
    error: HandlerError,
}

#[async_trait]
impl AgentBehavior<String> for Failing {
    async fn on_request(
        &self,
        _ctx: &AgentContext<String>,
        _from: &AgentId,
        _payload: &String,
    ) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn tool_name(&self) -> Option<&str> {
        Some("always_fails")
    }
}

struct Panicking;

#[async_trait]
impl AgentBehavior<String> for Panicking {
    async fn on_request(
        &self,
        _ctx: &AgentContext<String>,
        _from: &AgentId,
        _payload: &String,
    ) -> Result<(), HandlerError> {
        panic!("boom");
    }
}

struct Gated {
    gate: Arc<Semaphore>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AgentBehavior<String> for Gated {
    async fn on_request(
        &self,
        _ctx: &AgentContext<String>,
        _from: &AgentId,
        _payload: &String,
    ) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate
            .acquire()
            .await
            .map_err(|e| HandlerError::transient(e.to_string()))?
            .forget();
        Ok(())
    }
}

fn agent<B: AgentBehavior<String>>(id: &str, behavior: B) -> Agent<String> {
    Agent::new(AgentIdentity::new(id, id), behavior)
}

#[tokio::test]
async fn duplicate_registration_keeps_first() {
    let orchestrator = Orchestrator::<String>::default();
    orchestrator
        .register(Agent::new(AgentIdentity::new("a", "first"), Recorder::default()))
        .unwrap();

    let err = orchestrator
        .register(Agent::new(AgentIdentity::new("a", "second"), Recorder::default()))
        .unwrap_err();

    assert!(matches!(err, AgentError::DuplicateAgent(_)));
    assert_eq!(orchestrator.agent("a").unwrap().name(), "first");
    assert_eq!(orchestrator.agent_ids(), vec![AgentId::new("a")]);
}

#[tokio::test]
async fn review_channel_id_is_reserved() {
    let orchestrator = Orchestrator::<String>::default();
    let err = orchestrator
        .register(agent("orchestrator", Recorder::default()))
        .unwrap_err();
    assert!(matches!(err, AgentError::ReservedId(_)));
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = OrchestratorConfig::new().with_max_attempts(0);
    assert!(Orchestrator::<String>::new(config).is_err());
}

#[tokio::test]
async fn start_all_and_stop_all_drive_every_agent() {
    let orchestrator = Orchestrator::<String>::default();
    let a = orchestrator.register(agent("a", Recorder::default())).unwrap();
    let b = orchestrator.register(agent("b", Recorder::default())).unwrap();

    orchestrator.start_all().await.unwrap();
    assert_eq!(a.state(), AgentState::Running);
    assert_eq!(b.state(), AgentState::Running);
    assert!(orchestrator.is_running());

    orchestrator.stop_all().await.unwrap();
    assert_eq!(a.state(), AgentState::Stopped);
    assert_eq!(b.state(), AgentState::Stopped);
}

#[tokio::test]
async fn requests_are_routed_through_the_bus() {
    let orchestrator = Orchestrator::<String>::default();
    let sink = Recorder::default();
    orchestrator.register(agent("relay", Relay { to: "sink" })).unwrap();
    orchestrator.register(agent("sink", sink.clone())).unwrap();
    orchestrator.start_all().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "relay", "hello".to_string()))
        .unwrap();

    wait_until(|| sink.seen.lock().len() == 1).await;
    assert_eq!(sink.seen.lock().clone(), vec!["HELLO".to_string()]);
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn messages_submitted_before_start_are_delivered_after() {
    let orchestrator = Orchestrator::<String>::default();
    let sink = Recorder::default();
    orchestrator.register(agent("sink", sink.clone())).unwrap();

    orchestrator
        .submit(AgentMessage::notification("test", "sink", "early".to_string()))
        .unwrap();
    assert_eq!(orchestrator.bus().queue_len("sink"), 1);

    orchestrator.start_all().await.unwrap();
    wait_until(|| sink.seen.lock().len() == 1).await;
    assert_eq!(sink.seen.lock()[0], "note:early");
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn late_registration_is_routed() {
    let orchestrator = Orchestrator::<String>::default();
    orchestrator.start_all().await.unwrap();

    let sink = Recorder::default();
    let late = orchestrator.register(agent("late", sink.clone())).unwrap();
    late.start().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "late", "x".to_string()))
        .unwrap();
    wait_until(|| sink.seen.lock().len() == 1).await;
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn review_channel_messages_are_broadcast() {
    let orchestrator = Orchestrator::<String>::default();
    let mut review = orchestrator.subscribe_review();
    orchestrator.register(agent("relay", Relay { to: "orchestrator" })).unwrap();
    orchestrator.start_all().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "relay", "done".to_string()))
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), review.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.from.as_str(), "relay");
    assert_eq!(message.body.payload().map(String::as_str), Some("DONE"));
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn unknown_target_is_dropped() {
    let orchestrator = Orchestrator::<String>::default();
    orchestrator.start_all().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "ghost", "lost".to_string()))
        .unwrap();

    wait_until(|| orchestrator.bus().stats().rejected == 1).await;
    let stats = orchestrator.bus().stats();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.retried, 0);
    assert_eq!(stats.failed, 0);
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn transient_failures_are_retried_up_to_max_attempts() {
    let orchestrator = Orchestrator::<String>::default();
    let calls = Arc::new(AtomicUsize::new(0));
    orchestrator
        .register(agent(
            "flaky",
            Failing {
                calls: Arc::clone(&calls),
                error: HandlerError::transient("downstream unavailable"),
            },
        ))
        .unwrap();
    orchestrator.start_all().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "flaky", "x".to_string()))
        .unwrap();

    wait_until(|| orchestrator.bus().stats().failed == 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(orchestrator.bus().stats().retried, 2);
    orchestrator.stop_all().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn validation_failures_are_not_retried() {
    let orchestrator = Orchestrator::<String>::default();
    let mut errors = orchestrator.subscribe_errors();
    let calls = Arc::new(AtomicUsize::new(0));
    orchestrator
        .register(agent(
            "strict",
            Failing {
                calls: Arc::clone(&calls),
                error: HandlerError::validation("source_file is empty"),
            },
        ))
        .unwrap();
    orchestrator.start_all().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "strict", "x".to_string()))
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.agent_id.as_str(), "strict");
    assert_eq!(event.class, ErrorClass::Validation);
    assert_eq!(event.tool_name.as_deref(), Some("always_fails"));
    assert!(!event.retryable);
    assert!(event.context.get("message_id").is_some());

    wait_until(|| orchestrator.bus().stats().rejected == 1).await;
    let stats = orchestrator.bus().stats();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.retried, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn panicking_agent_does_not_take_down_siblings() {
    let orchestrator = Orchestrator::<String>::default();
    let mut errors = orchestrator.subscribe_errors();
    let sink = Recorder::default();
    orchestrator.register(agent("bomb", Panicking)).unwrap();
    orchestrator.register(agent("sink", sink.clone())).unwrap();
    orchestrator.start_all().await.unwrap();

    orchestrator
        .submit(AgentMessage::request("test", "bomb", "x".to_string()))
        .unwrap();
    orchestrator
        .submit(AgentMessage::request("test", "sink", "ok".to_string()))
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.class, ErrorClass::Panic);
    wait_until(|| sink.seen.lock().len() == 1).await;
    orchestrator.stop_all().await.unwrap();
}

#[tokio::test]
async fn stop_all_halts_delivery_of_queued_messages() {
    let orchestrator = Arc::new(Orchestrator::<String>::default());
    let gate = Arc::new(Semaphore::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let worker = orchestrator
        .register(agent(
            "worker",
            Gated {
                gate: Arc::clone(&gate),
                calls: Arc::clone(&calls),
            },
        ))
        .unwrap();
    orchestrator.start_all().await.unwrap();

    for i in 0..4 {
        orchestrator
            .submit(AgentMessage::request("test", "worker", format!("job-{i}")))
            .unwrap();
    }
    wait_until(|| calls.load(Ordering::SeqCst) == 1).await;

    let stopping = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.stop_all().await }
    });
    wait_until(|| !orchestrator.bus().is_running()).await;
    gate.add_permits(10);
    stopping.await.unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.bus().queue_len("worker"), 3);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let direct = worker
        .handle_message(AgentMessage::request("test", "worker", "late".to_string()))
        .await;
    assert!(matches!(direct, Err(AgentError::NotRunning(_))));
}

#[tokio::test]
async fn orchestrator_is_single_use() {
    let orchestrator = Orchestrator::<String>::default();
    orchestrator.start_all().await.unwrap();
    orchestrator.stop_all().await.unwrap();

    assert!(matches!(orchestrator.start_all().await, Err(AgentError::ShutDown)));
    assert!(matches!(
        orchestrator.register(agent("x", Recorder::default())),
        Err(AgentError::ShutDown)
    ));
    assert!(matches!(
        orchestrator.submit(AgentMessage::request("t", "x", String::new())),
        Err(AgentError::ShutDown)
    ));
    orchestrator.stop_all().await.unwrap();
}
