//! # A2A Agent Capability
//!
//! The interface a participant implements to join the bus. Plumbing
//! (subscriptions, announcement, cancellation) is owned by the
//! [`AgentSupervisor`](super::supervisor::AgentSupervisor); agents only
//! provide identity, lifecycle hooks and the request handler.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

use super::bus::MessageBus;
use super::message::{AgentInfoPayload, AgentMessage};
use crate::config::FabricConfig;
use crate::error::A2aResult;

/// Everything an agent receives during initialization
#[derive(Clone)]
pub struct AgentContext {
    pub bus: MessageBus,
    pub config: Arc<FabricConfig>,
    cancel: watch::Receiver<bool>,
}

impl AgentContext {
    pub fn new(bus: MessageBus, config: Arc<FabricConfig>, cancel: watch::Receiver<bool>) -> Self {
        Self {
            bus,
            config,
            cancel,
        }
    }

    /// Receiver that flips to `true` when the agent's scope is cancelled
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// A bus participant
#[async_trait]
pub trait A2aAgent: Send + Sync + 'static {
    /// Unique and stable for the agent's lifetime
    fn agent_id(&self) -> &str;

    fn agent_type(&self) -> &str;

    fn supported_message_types(&self) -> &BTreeSet<String>;

    /// Class name of the wrapped legacy implementation, if any
    fn legacy_agent_class(&self) -> Option<&str> {
        None
    }

    /// Event types this agent wants delivered to [`A2aAgent::handle_event`]
    fn event_types(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports(&self, message_type: &str) -> bool {
        self.supported_message_types().contains(message_type)
    }

    /// Readiness announcement published on activation
    fn agent_info(&self) -> AgentInfoPayload {
        AgentInfoPayload {
            agent_id: self.agent_id().to_string(),
            agent_type: self.agent_type().to_string(),
            legacy_agent_class: self.legacy_agent_class().map(str::to_string),
            supported_message_types: self.supported_message_types().iter().cloned().collect(),
            timestamp: Utc::now(),
        }
    }

    /// Runs once before the agent becomes active
    async fn initialize(&self, _ctx: &AgentContext) -> A2aResult<()> {
        Ok(())
    }

    /// Translate a request into a response. Must always answer; failures are
    /// expressed as `Response { success: false }`.
    async fn handle_request(&self, request: &AgentMessage) -> AgentMessage;

    async fn handle_event(&self, _event: &AgentMessage) {}

    /// Release agent-owned resources. Called once, after subscriptions are gone.
    async fn shutdown(&self) {}
}
