//! # Agent Supervision
//!
//! Each agent runs inside its own scope: one init task, one inbox task, and a
//! `JoinSet` of in-flight request tasks, all watching a per-agent cancel
//! channel. A panic or cancellation inside one scope never reaches another
//! agent or the bus.
//!
//! ```text
//! spawn(agent)
//!   ├── subscribe inbox (requests for this agent + wanted events)
//!   ├── init task:  initialize() → Active → announce AGENT_INFO
//!   └── inbox task: recv ──▶ not Active?     → not_ready response
//!                          ├ unsupported?    → unsupported_type response
//!                          └ JoinSet.spawn(handle_request) → publish response
//! shutdown()
//!   └── cancel → inbox task deregisters, answers queued requests not_ready,
//!                gives in-flight requests a grace period, aborts the rest
//!                (answered not_ready), runs shutdown hook,
//!                publishes AGENT_DEPARTED → Terminated
//! ```
//!
//! Every request an agent received is answered exactly once, even when the
//! agent goes away while the request is queued or running.

use futures::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use super::agent::{A2aAgent, AgentContext};
use super::bus::{MessageBus, Subscription};
use super::lifecycle::{AgentState, Lifecycle};
use super::message::{message_types, AgentMessage, MessageClass, MessagePayload};
use crate::config::FabricConfig;
use crate::error::{A2aError, A2aResult};

/// Resolves once `rx` reads `true` or its sender is gone
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_for_state(lifecycle: &Lifecycle, done: impl Fn(AgentState) -> bool) -> AgentState {
    let mut rx = lifecycle.watch();
    loop {
        let state = *rx.borrow_and_update();
        if done(state) || rx.changed().await.is_err() {
            return state;
        }
    }
}

fn publish_or_log(bus: &MessageBus, agent_id: &str, message: AgentMessage) {
    if let Err(e) = bus.publish(message) {
        tracing::warn!(agent_id = %agent_id, error = %e, "Failed to publish from agent");
    }
}

fn reject(bus: &MessageBus, agent_id: &str, request: &AgentMessage, error: &A2aError) {
    publish_or_log(bus, agent_id, AgentMessage::error_response(request, agent_id, error));
}

fn publish_info(agent: &dyn A2aAgent, bus: &MessageBus, event_type: &str) {
    let event = AgentMessage::event(
        agent.agent_id(),
        event_type,
        MessagePayload::AgentInfo(agent.agent_info()),
    );
    publish_or_log(bus, agent.agent_id(), event);
}

fn announce(agent: &dyn A2aAgent, bus: &MessageBus) {
    publish_info(agent, bus, message_types::AGENT_INFO_EVENT);
}

/// Requests handed to a request task and not yet answered, by request id
type Pending = Arc<Mutex<HashMap<String, AgentMessage>>>;

fn lock_pending(pending: &Pending) -> std::sync::MutexGuard<'_, HashMap<String, AgentMessage>> {
    pending.lock().unwrap_or_else(|p| p.into_inner())
}

/// Starts agents inside their own supervision scope
pub struct AgentSupervisor;

impl AgentSupervisor {
    /// Subscribe `agent`, then start its init and inbox tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        agent: Arc<dyn A2aAgent>,
        bus: MessageBus,
        config: Arc<FabricConfig>,
    ) -> A2aResult<AgentHandle> {
        let agent_id = agent.agent_id().to_string();
        let lifecycle = Arc::new(Lifecycle::new());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);

        let inbox = Self::subscribe_inbox(&bus, agent.as_ref())?;
        lifecycle.advance();
        tracing::info!(agent_id = %agent_id, agent_type = %agent.agent_type(), "Agent initializing");

        let ctx = AgentContext::new(bus, config, cancel_rx);

        let init_task = tokio::spawn(run_init(
            Arc::clone(&agent),
            ctx.clone(),
            Arc::clone(&lifecycle),
            Arc::clone(&cancel_tx),
        ));
        let inbox_task = tokio::spawn(run_inbox(
            Arc::clone(&agent),
            inbox,
            ctx,
            Arc::clone(&lifecycle),
        ));

        Ok(AgentHandle {
            agent_id,
            agent_type: agent.agent_type().to_string(),
            lifecycle,
            cancel: cancel_tx,
            tasks: Mutex::new(vec![init_task, inbox_task]),
        })
    }

    /// Requests targeted at the agent, broadcasts of supported types, and
    /// wanted events on one channel so their relative order is kept.
    fn subscribe_inbox(bus: &MessageBus, agent: &dyn A2aAgent) -> A2aResult<Subscription> {
        let agent_id = agent.agent_id().to_string();
        let supported = agent.supported_message_types().clone();
        let mut events: BTreeSet<String> = agent.event_types().into_iter().collect();
        events.insert(message_types::AGENT_DISCOVERY_EVENT.to_string());

        Ok(bus.subscribe_any(move |message| match message {
            AgentMessage::Request {
                target_id,
                message_type,
                ..
            } => match target_id {
                Some(target) => *target == agent_id,
                None => supported.contains(message_type),
            },
            AgentMessage::Event { event_type, .. } => events.contains(event_type),
            _ => false,
        })?)
    }
}

async fn run_init(
    agent: Arc<dyn A2aAgent>,
    ctx: AgentContext,
    lifecycle: Arc<Lifecycle>,
    cancel: Arc<watch::Sender<bool>>,
) {
    let agent_id = agent.agent_id().to_string();
    let mut cancel_rx = ctx.cancellation();

    let outcome = tokio::select! {
        _ = cancelled(&mut cancel_rx) => {
            tracing::debug!(agent_id = %agent_id, "Initialization cancelled");
            return;
        }
        outcome = AssertUnwindSafe(agent.initialize(&ctx)).catch_unwind() => outcome,
    };

    let failure = match outcome {
        Ok(Ok(())) => {
            if lifecycle.transition(AgentState::Initializing, AgentState::Active) {
                tracing::info!(agent_id = %agent_id, "Agent active");
                if ctx.config.announce_on_init {
                    announce(agent.as_ref(), &ctx.bus);
                }
            }
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => "initialize panicked".to_string(),
    };

    tracing::error!(agent_id = %agent_id, error = %failure, "Agent failed to initialize");
    lifecycle.begin_shutdown();
    cancel.send_replace(true);
}

async fn run_inbox(
    agent: Arc<dyn A2aAgent>,
    mut inbox: Subscription,
    ctx: AgentContext,
    lifecycle: Arc<Lifecycle>,
) {
    let agent_id = agent.agent_id().to_string();
    let mut cancel_rx = ctx.cancellation();
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let pending: Pending = Arc::default();

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => break,
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(agent_id = %agent_id, "Request task panicked");
                    }
                }
            }
            message = inbox.recv() => match message {
                Some(message) => {
                    dispatch(&agent, message, &ctx, &lifecycle, &mut in_flight, &pending).await
                }
                None => {
                    tracing::info!(agent_id = %agent_id, "Inbox closed by bus");
                    break;
                }
            },
        }
    }

    lifecycle.begin_shutdown();
    let shutting_down = A2aError::NotReady(format!("agent {} is shutting down", agent_id));
    for message in inbox.cancel_and_drain() {
        if message.class() == MessageClass::Request {
            tracing::debug!(agent_id = %agent_id, request_id = %message.id(), "Rejecting queued request");
            reject(&ctx.bus, &agent_id, &message, &shutting_down);
        }
    }

    // cancellation is already visible to cooperative handlers
    let drain = async { while in_flight.join_next().await.is_some() {} };
    if tokio::time::timeout(ctx.config.shutdown_grace(), drain).await.is_err() {
        tracing::warn!(agent_id = %agent_id, in_flight = in_flight.len(), "Aborting in-flight requests");
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
    }
    let abandoned: Vec<AgentMessage> = lock_pending(&pending).drain().map(|(_, m)| m).collect();
    let aborted = A2aError::NotReady("cancelled".into());
    for request in &abandoned {
        reject(&ctx.bus, &agent_id, request, &aborted);
    }

    if AssertUnwindSafe(agent.shutdown()).catch_unwind().await.is_err() {
        tracing::error!(agent_id = %agent_id, "Shutdown hook panicked");
    }
    if ctx.config.announce_on_init {
        publish_info(agent.as_ref(), &ctx.bus, message_types::AGENT_DEPARTED_EVENT);
    }
    lifecycle.terminate();
    tracing::info!(agent_id = %agent_id, "Agent terminated");
}

async fn dispatch(
    agent: &Arc<dyn A2aAgent>,
    message: AgentMessage,
    ctx: &AgentContext,
    lifecycle: &Lifecycle,
    in_flight: &mut JoinSet<()>,
    pending: &Pending,
) {
    let agent_id = agent.agent_id();
    let message_type = message.message_type().unwrap_or_default().to_string();
    match message.class() {
        MessageClass::Request => {
            let state = lifecycle.state();
            if !state.accepts_requests() {
                tracing::warn!(
                    agent_id = %agent_id,
                    state = ?state,
                    request_id = %message.id(),
                    "Rejecting request, agent not active"
                );
                let error = A2aError::NotReady(format!("agent {} is {:?}", agent_id, state));
                reject(&ctx.bus, agent_id, &message, &error);
                return;
            }
            if !agent.supports(&message_type) {
                tracing::warn!(
                    agent_id = %agent_id,
                    message_type = %message_type,
                    "Rejecting unsupported request"
                );
                reject(&ctx.bus, agent_id, &message, &A2aError::UnsupportedType(message_type));
                return;
            }
            if ctx.config.acknowledge_requests {
                publish_or_log(&ctx.bus, agent_id, AgentMessage::ack(&message, agent_id));
            }

            tracing::debug!(agent_id = %agent_id, request_id = %message.id(), message_type = %message_type, "Dispatching request");
            lock_pending(pending).insert(message.id().to_string(), message.clone());
            let agent = Arc::clone(agent);
            let bus = ctx.bus.clone();
            let pending = Arc::clone(pending);
            in_flight.spawn(async move {
                let agent_id = agent.agent_id();
                let outcome = AssertUnwindSafe(agent.handle_request(&message))
                    .catch_unwind()
                    .await;
                let response = match outcome {
                    Ok(response) if response.is_response_to(message.id()) => response,
                    Ok(_) => {
                        tracing::error!(agent_id = %agent_id, "Handler returned an uncorrelated message");
                        let error = A2aError::ProcessingError(
                            "handler returned an uncorrelated message".into(),
                        );
                        AgentMessage::error_response(&message, agent_id, &error)
                    }
                    Err(_) => {
                        tracing::error!(agent_id = %agent_id, request_id = %message.id(), "Request handler panicked");
                        let error = A2aError::ProcessingError("request handler panicked".into());
                        AgentMessage::error_response(&message, agent_id, &error)
                    }
                };
                // no await between these two, so an abort can't split them
                lock_pending(&pending).remove(message.id());
                publish_or_log(&bus, agent_id, response);
            });
        }
        MessageClass::Event => {
            let event_type = message_type;
            if event_type == message_types::AGENT_DISCOVERY_EVENT
                && ctx.config.announce_on_init
                && lifecycle.state().accepts_requests()
            {
                announce(agent.as_ref(), &ctx.bus);
            }
            if agent.event_types().contains(&event_type)
                && AssertUnwindSafe(agent.handle_event(&message))
                    .catch_unwind()
                    .await
                    .is_err()
            {
                tracing::error!(agent_id = %agent_id, event_type = %event_type, "Event handler panicked");
            }
        }
        _ => {}
    }
}

/// Owner's view of a supervised agent
pub struct AgentHandle {
    agent_id: String,
    agent_type: String,
    lifecycle: Arc<Lifecycle>,
    cancel: Arc<watch::Sender<bool>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AgentHandle {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    pub fn state(&self) -> AgentState {
        self.lifecycle.state()
    }

    /// Wait for `Active`; fails if the agent stops first
    pub async fn wait_until_active(&self) -> A2aResult<()> {
        let state =
            wait_for_state(&self.lifecycle, |s| s.accepts_requests() || s.is_stopping()).await;
        if state.accepts_requests() {
            Ok(())
        } else {
            Err(A2aError::NotReady(format!(
                "agent {} is {:?}",
                self.agent_id, state
            )))
        }
    }

    /// Cancel the agent's scope and wait for `Terminated`. Idempotent.
    pub async fn shutdown(&self) {
        if self.lifecycle.begin_shutdown() {
            tracing::info!(agent_id = %self.agent_id, "Agent shutting down");
        }
        self.cancel.send_replace(true);

        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        if !tasks.is_empty() {
            for task in tasks {
                if let Err(e) = task.await {
                    if e.is_panic() {
                        tracing::error!(agent_id = %self.agent_id, "Supervised task panicked");
                    }
                }
            }
            self.lifecycle.terminate();
        }

        wait_for_state(&self.lifecycle, |s| s == AgentState::Terminated).await;
    }
}

/// A set of supervised agents sharing one bus
pub struct Swarm {
    bus: MessageBus,
    config: Arc<FabricConfig>,
    handles: Vec<AgentHandle>,
}

impl Swarm {
    pub fn new(bus: MessageBus, config: FabricConfig) -> Self {
        Self {
            bus,
            config: Arc::new(config),
            handles: Vec::new(),
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn config(&self) -> &Arc<FabricConfig> {
        &self.config
    }

    /// Start an agent; ids must be unique within the swarm
    pub fn spawn(&mut self, agent: Arc<dyn A2aAgent>) -> A2aResult<&AgentHandle> {
        if self.handle(agent.agent_id()).is_some() {
            return Err(A2aError::DuplicateAgent(agent.agent_id().to_string()));
        }
        let handle = AgentSupervisor::spawn(agent, self.bus.clone(), Arc::clone(&self.config))?;
        self.handles.push(handle);
        Ok(&self.handles[self.handles.len() - 1])
    }

    pub fn handle(&self, agent_id: &str) -> Option<&AgentHandle> {
        self.handles.iter().find(|h| h.agent_id() == agent_id)
    }

    pub fn agent_ids(&self) -> Vec<&str> {
        self.handles.iter().map(AgentHandle::agent_id).collect()
    }

    /// Wait until every agent is active
    pub async fn wait_until_ready(&self) -> A2aResult<()> {
        for handle in &self.handles {
            handle.wait_until_active().await?;
        }
        Ok(())
    }

    /// Shut down one agent, leaving its siblings running
    pub async fn shutdown_agent(&mut self, agent_id: &str) -> bool {
        let Some(index) = self.handles.iter().position(|h| h.agent_id() == agent_id) else {
            return false;
        };
        let handle = self.handles.remove(index);
        handle.shutdown().await;
        true
    }

    pub async fn shutdown_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.shutdown().await;
        }
        tracing::info!("Swarm shut down");
    }
}
