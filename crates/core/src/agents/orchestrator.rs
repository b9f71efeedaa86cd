//! # Orchestrator Agent
//!
//! Learns who is on the bus from `AGENT_INFO` announcements and routes work
//! to them. There is no registry service: the directory is rebuilt from
//! announcements alone, and a discovery event on startup asks agents that
//! came up earlier to announce again. `AGENT_DEPARTED` removes an entry.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use crate::error::{A2aError, A2aResult};
use crate::swarm::agent::{A2aAgent, AgentContext};
use crate::swarm::bus::MessageBus;
use crate::swarm::correlation;
use crate::swarm::message::{
    message_types, AgentDirectoryPayload, AgentInfoPayload, AgentMessage, MessagePayload,
};

pub struct OrchestratorAgent {
    agent_id: String,
    supported: BTreeSet<String>,
    directory: RwLock<BTreeMap<String, AgentInfoPayload>>,
    bus: OnceLock<MessageBus>,
}

impl OrchestratorAgent {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            supported: [message_types::AGENT_DIRECTORY_REQUEST.to_string()]
                .into_iter()
                .collect(),
            directory: RwLock::new(BTreeMap::new()),
            bus: OnceLock::new(),
        }
    }

    /// Announced agents ordered by id
    pub fn directory(&self) -> Vec<AgentInfoPayload> {
        self.directory
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// First announced agent (by id) that handles `message_type`
    pub fn find_agent_for(&self, message_type: &str) -> Option<String> {
        self.directory
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .find(|info| {
                info.agent_id != self.agent_id
                    && info.supported_message_types.iter().any(|t| t == message_type)
            })
            .map(|info| info.agent_id.clone())
    }

    /// Send `input` to a capable agent and wait for its response
    pub async fn dispatch(
        &self,
        message_type: &str,
        input: Value,
        timeout: Duration,
    ) -> A2aResult<AgentMessage> {
        let bus = self
            .bus
            .get()
            .ok_or_else(|| A2aError::NotReady(format!("{} is not initialized", self.agent_id)))?;
        let target = self.find_agent_for(message_type).ok_or_else(|| {
            A2aError::UnsupportedType(format!("no agent announced {}", message_type))
        })?;

        tracing::info!(message_type = %message_type, target = %target, "Dispatching");
        let request = AgentMessage::request(
            &self.agent_id,
            message_type,
            MessagePayload::custom_input(message_type, input),
        )
        .with_target(target);
        correlation::request(bus, request, timeout).await
    }

    fn record(&self, info: &AgentInfoPayload) {
        let mut directory = self.directory.write().unwrap_or_else(|p| p.into_inner());
        if directory.insert(info.agent_id.clone(), info.clone()).is_none() {
            tracing::info!(agent_id = %info.agent_id, agent_type = %info.agent_type, types = info.supported_message_types.len(), "Discovered agent");
        }
    }

    fn forget(&self, agent_id: &str) {
        let mut directory = self.directory.write().unwrap_or_else(|p| p.into_inner());
        if directory.remove(agent_id).is_some() {
            tracing::info!(agent_id = %agent_id, "Agent departed");
        }
    }
}

#[async_trait]
impl A2aAgent for OrchestratorAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn agent_type(&self) -> &str {
        "orchestrator"
    }

    fn supported_message_types(&self) -> &BTreeSet<String> {
        &self.supported
    }

    fn event_types(&self) -> Vec<String> {
        vec![
            message_types::AGENT_INFO_EVENT.to_string(),
            message_types::AGENT_DEPARTED_EVENT.to_string(),
        ]
    }

    async fn initialize(&self, ctx: &AgentContext) -> A2aResult<()> {
        let _ = self.bus.set(ctx.bus.clone());
        ctx.bus.publish(AgentMessage::event(
            &self.agent_id,
            message_types::AGENT_DISCOVERY_EVENT,
            MessagePayload::custom("discovery", Default::default()),
        ))?;
        Ok(())
    }

    async fn handle_request(&self, request: &AgentMessage) -> AgentMessage {
        AgentMessage::success_response(
            request,
            &self.agent_id,
            MessagePayload::AgentDirectory(AgentDirectoryPayload {
                agents: self.directory(),
            }),
        )
    }

    async fn handle_event(&self, event: &AgentMessage) {
        let Some(MessagePayload::AgentInfo(info)) = event.payload() else {
            return;
        };
        match event.message_type() {
            Some(message_types::AGENT_DEPARTED_EVENT) => self.forget(&info.agent_id),
            _ => self.record(info),
        }
    }

    async fn shutdown(&self) {
        self.directory
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }
}
