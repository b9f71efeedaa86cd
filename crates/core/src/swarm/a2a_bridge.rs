//! # A2A Bridge
//!
//! Wraps a synchronous [`ToolAgent`] so it can sit on the bus.
//!
//! ```text
//! Request ──▶ extract input ──▶ inject subtype ──▶ validate_input
//!                                                     │
//!             ┌───────────── invalid ◀────────────────┤
//!             ▼                                       ▼ valid
//!      Response{false}       permit ──▶ spawn_blocking(execute_step)
//!                                                     │
//!                     Response{true, Custom _RESPONSE} or Response{false}
//! ```
//!
//! Each legacy call runs on the blocking pool behind the adapter's own
//! semaphore, so a slow tool never stalls bus delivery or its siblings.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};

use super::agent::{A2aAgent, AgentContext};
use super::message::{message_types, AgentMessage, MessagePayload};
use super::routing;
use super::supervisor::cancelled;
use crate::error::{A2aError, A2aResult};
use crate::skills::step::{ExecutionContext, StepInput, StepResult, ToolAgent, ToolPlanStep};

const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Step input from `Custom.data["input"]`.
///
/// A missing or non-object `input` is an empty mapping; required fields
/// are the tool's business. Non-`Custom` payloads are rejected.
pub fn extract_input(request: &AgentMessage) -> A2aResult<StepInput> {
    match request.payload() {
        Some(MessagePayload::Custom(custom)) => Ok(match custom.data.get("input") {
            Some(Value::Object(map)) => StepInput::from(map.clone()),
            _ => StepInput::new(),
        }),
        Some(other) => Err(A2aError::UnsupportedPayload(format!(
            "expected custom payload, got {}",
            other.kind()
        ))),
        None => Err(A2aError::UnsupportedPayload("request has no payload".into())),
    }
}

/// Bus-facing wrapper around a legacy tool agent
pub struct LegacyAgentAdapter<T: ToolAgent> {
    agent_id: String,
    tool: Arc<T>,
    supported: BTreeSet<String>,
    permits: Arc<Semaphore>,
    cancel: Mutex<watch::Receiver<bool>>,
    // keeps the default receiver open until `initialize` swaps in the scope's
    _standalone: watch::Sender<bool>,
}

impl<T: ToolAgent> LegacyAgentAdapter<T> {
    pub fn new<I, S>(agent_id: impl Into<String>, tool: T, message_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (standalone, cancel) = watch::channel(false);
        Self {
            agent_id: agent_id.into(),
            tool: Arc::new(tool),
            supported: message_types.into_iter().map(Into::into).collect(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            cancel: Mutex::new(cancel),
            _standalone: standalone,
        }
    }

    /// Bound concurrent legacy calls (minimum 1)
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    #[tracing::instrument(skip(self, request), fields(agent_id = %self.agent_id, request_id = %request.id()))]
    async fn process(&self, request: &AgentMessage) -> A2aResult<AgentMessage> {
        let message_type = request.message_type().unwrap_or_default().to_string();
        if !self.supported.contains(&message_type) {
            return Err(A2aError::UnsupportedType(message_type));
        }

        let mut input = extract_input(request)?;
        if !input.contains("request_subtype") {
            if let Some(subtype) = routing::subtype_for(&message_type) {
                input.insert("request_subtype", subtype);
            }
        }
        let subtype = input
            .get_string("request_subtype")
            .unwrap_or_default()
            .to_string();

        let step_id = request
            .metadata()
            .and_then(|m| m.get("step_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("a2a-{}", request.id()));

        let validation = self.tool.validate_input(&input);
        if !validation.valid {
            tracing::debug!(errors = ?validation.errors, "Input rejected by tool validation");
            let error = format!("validation_failed: {}", validation.errors.join("; "));
            return Ok(AgentMessage::response_to(
                request,
                &self.agent_id,
                false,
                MessagePayload::error(error.clone(), Some("validation_failed".to_string())),
                Some(error),
            )
            .with_metadata("step_id", Value::String(step_id)));
        }

        let step = ToolPlanStep {
            id: step_id.clone(),
            title: format!("{} via A2A", message_type),
            description: format!("{} from {}", message_type, request.sender_id()),
            agent_type: self.tool.agent_type().to_string(),
            input,
        };
        let context = ExecutionContext {
            request_id: request.id().to_string(),
            message_type: message_type.clone(),
            metadata: request.metadata().cloned().unwrap_or_default(),
        };

        let mut cancel = self.cancellation();
        if *cancel.borrow_and_update() {
            return Err(A2aError::NotReady("cancelled".into()));
        }

        let permit = tokio::select! {
            _ = cancelled(&mut cancel) => return Err(A2aError::NotReady("cancelled".into())),
            permit = Arc::clone(&self.permits).acquire_owned() => permit
                .map_err(|_| A2aError::NotReady("adapter closed".into()))?,
        };

        let tool = Arc::clone(&self.tool);
        let blocking = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            tool.execute_step(&step, &context)
        });

        let joined = tokio::select! {
            _ = cancelled(&mut cancel) => {
                tracing::warn!("Cancelled during legacy call, detaching");
                return Err(A2aError::NotReady("cancelled".into()));
            }
            joined = blocking => joined,
        };

        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                tracing::error!("Legacy agent panicked");
                return Err(A2aError::ProcessingError("legacy agent panicked".into()));
            }
            Err(_) => return Err(A2aError::ProcessingError("legacy call aborted".into())),
        };
        if *cancel.borrow() {
            return Err(A2aError::NotReady("cancelled".into()));
        }

        Ok(self.translate(request, &message_type, &step_id, &subtype, result))
    }

    fn translate(
        &self,
        request: &AgentMessage,
        message_type: &str,
        step_id: &str,
        subtype: &str,
        result: StepResult,
    ) -> AgentMessage {
        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| "legacy step failed".to_string());
            let cause = result
                .metadata
                .get("error_code")
                .and_then(Value::as_str)
                .unwrap_or("processing_error")
                .to_string();
            tracing::info!(cause = %cause, error = %error, "Legacy step failed");
            return AgentMessage::response_to(
                request,
                &self.agent_id,
                false,
                MessagePayload::error(error.clone(), Some(cause)),
                Some(error),
            )
            .with_metadata(
                "response_type",
                Value::String(message_types::error_type_for(message_type)),
            )
            .with_metadata("step_id", Value::String(step_id.to_string()));
        }

        let mut data = result.output.into_map();
        let mut envelope = match data.remove("metadata") {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        envelope.insert("agent".into(), Value::String(self.agent_id.clone()));
        envelope.insert("agent_type".into(), Value::String(self.tool.agent_type().to_string()));
        envelope.insert("legacy_class".into(), Value::String(self.tool.legacy_class().to_string()));
        envelope.insert("step_id".into(), Value::String(step_id.to_string()));
        envelope.insert("request_subtype".into(), Value::String(subtype.to_string()));
        if !result.metadata.is_empty() {
            envelope.insert("legacy_metadata".into(), Value::Object(result.metadata));
        }
        data.insert("metadata".into(), Value::Object(envelope));

        AgentMessage::success_response(
            request,
            &self.agent_id,
            MessagePayload::custom(message_types::response_type_for(message_type), data),
        )
        .with_metadata("step_id", Value::String(step_id.to_string()))
    }
}

#[async_trait]
impl<T: ToolAgent> A2aAgent for LegacyAgentAdapter<T> {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn agent_type(&self) -> &str {
        self.tool.agent_type()
    }

    fn supported_message_types(&self) -> &BTreeSet<String> {
        &self.supported
    }

    fn legacy_agent_class(&self) -> Option<&str> {
        Some(self.tool.legacy_class())
    }

    async fn initialize(&self, ctx: &AgentContext) -> A2aResult<()> {
        *self.cancel.lock().unwrap_or_else(|p| p.into_inner()) = ctx.cancellation();
        tracing::debug!(agent_id = %self.agent_id, legacy_class = %self.tool.legacy_class(), "Adapter initialized");
        Ok(())
    }

    async fn handle_request(&self, request: &AgentMessage) -> AgentMessage {
        match self.process(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(agent_id = %self.agent_id, request_id = %request.id(), code = e.code(), error = %e, "Request failed");
                AgentMessage::error_response(request, &self.agent_id, &e)
            }
        }
    }
}
