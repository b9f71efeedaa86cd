//! # A2A Messages
//!
//! Everything that can travel on the bus. Messages are built at the call site
//! and never mutated afterwards; each subscriber receives its own copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::A2aError;

/// Open side-channel mapping (step id, timestamps). Never used for routing.
pub type Metadata = Map<String, Value>;

/// Message-type taxonomy observed by the fabric.
///
/// `_RESPONSE` / `_ERROR` suffixes are convention only; dispatch is always on
/// the literal string.
pub mod message_types {
    pub const CODE_GENERATION_REQUEST: &str = "CODE_GENERATION_REQUEST";
    pub const CLASS_GENERATION_REQUEST: &str = "CLASS_GENERATION_REQUEST";
    pub const FUNCTION_GENERATION_REQUEST: &str = "FUNCTION_GENERATION_REQUEST";
    pub const ALGORITHM_GENERATION_REQUEST: &str = "ALGORITHM_GENERATION_REQUEST";
    pub const EMBEDDING_INDEX_REQUEST: &str = "EMBEDDING_INDEX_REQUEST";
    pub const OPEN_FILE_REQUEST: &str = "OPEN_FILE_REQUEST";
    pub const FILE_DATA_REQUEST: &str = "FILE_DATA_REQUEST";
    pub const PROJECT_STRUCTURE_REQUEST: &str = "PROJECT_STRUCTURE_REQUEST";
    pub const AGENT_DIRECTORY_REQUEST: &str = "AGENT_DIRECTORY_REQUEST";

    /// Event announcing an agent and its capabilities
    pub const AGENT_INFO_EVENT: &str = "AGENT_INFO";
    /// Event asking every active agent to announce itself again
    pub const AGENT_DISCOVERY_EVENT: &str = "AGENT_DISCOVERY";
    /// Event published by an agent on its way out; carries its last `AgentInfo`
    pub const AGENT_DEPARTED_EVENT: &str = "AGENT_DEPARTED";

    /// `FOO_REQUEST` -> `FOO_RESPONSE`
    pub fn response_type_for(request_type: &str) -> String {
        with_suffix(request_type, "_RESPONSE")
    }

    /// `FOO_REQUEST` -> `FOO_ERROR`
    pub fn error_type_for(request_type: &str) -> String {
        with_suffix(request_type, "_ERROR")
    }

    fn with_suffix(request_type: &str, suffix: &str) -> String {
        match request_type.strip_suffix("_REQUEST") {
            Some(stem) => format!("{stem}{suffix}"),
            None => format!("{request_type}{suffix}"),
        }
    }
}

/// Class of a message, used as the coarse subscription filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    Request,
    Response,
    Event,
    Ack,
}

/// Generic structured data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(default)]
    pub cause: Option<String>,
}

/// Readiness announcement; the only discovery mechanism on the fabric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfoPayload {
    pub agent_id: String,
    pub agent_type: String,
    #[serde(default)]
    pub legacy_agent_class: Option<String>,
    pub supported_message_types: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStructurePayload {
    pub root: String,
    pub files: Vec<String>,
    pub directories: Vec<String>,
    pub project_type: String,
    pub total_files: usize,
    #[serde(default)]
    pub truncated: bool,
    pub scanned_at: DateTime<Utc>,
}

/// Snapshot of every agent the orchestrator has heard announce itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDirectoryPayload {
    pub agents: Vec<AgentInfoPayload>,
}

/// Payload variants. Closed per release; anything else decodes to `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Custom(CustomPayload),
    Error(ErrorPayload),
    AgentInfo(AgentInfoPayload),
    ProjectStructure(ProjectStructurePayload),
    AgentDirectory(AgentDirectoryPayload),
    /// A variant this release does not understand
    Unknown { kind: String, raw: Value },
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TaggedPayloadRef<'a> {
    Custom(&'a CustomPayload),
    Error(&'a ErrorPayload),
    AgentInfo(&'a AgentInfoPayload),
    ProjectStructure(&'a ProjectStructurePayload),
    AgentDirectory(&'a AgentDirectoryPayload),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TaggedPayload {
    Custom(CustomPayload),
    Error(ErrorPayload),
    AgentInfo(AgentInfoPayload),
    ProjectStructure(ProjectStructurePayload),
    AgentDirectory(AgentDirectoryPayload),
}

impl Serialize for MessagePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tagged = match self {
            MessagePayload::Custom(p) => TaggedPayloadRef::Custom(p),
            MessagePayload::Error(p) => TaggedPayloadRef::Error(p),
            MessagePayload::AgentInfo(p) => TaggedPayloadRef::AgentInfo(p),
            MessagePayload::ProjectStructure(p) => TaggedPayloadRef::ProjectStructure(p),
            MessagePayload::AgentDirectory(p) => TaggedPayloadRef::AgentDirectory(p),
            MessagePayload::Unknown { raw, .. } => return raw.serialize(serializer),
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MessagePayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match serde_json::from_value::<TaggedPayload>(raw.clone()) {
            Ok(TaggedPayload::Custom(p)) => Ok(MessagePayload::Custom(p)),
            Ok(TaggedPayload::Error(p)) => Ok(MessagePayload::Error(p)),
            Ok(TaggedPayload::AgentInfo(p)) => Ok(MessagePayload::AgentInfo(p)),
            Ok(TaggedPayload::ProjectStructure(p)) => Ok(MessagePayload::ProjectStructure(p)),
            Ok(TaggedPayload::AgentDirectory(p)) => Ok(MessagePayload::AgentDirectory(p)),
            Err(_) => {
                let kind = raw
                    .get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                Ok(MessagePayload::Unknown { kind, raw })
            }
        }
    }
}

impl MessagePayload {
    /// Build a custom payload
    pub fn custom(payload_type: impl Into<String>, data: Map<String, Value>) -> Self {
        MessagePayload::Custom(CustomPayload {
            payload_type: payload_type.into(),
            data,
        })
    }

    /// Build a custom payload wrapping `input` under `data["input"]`
    pub fn custom_input(payload_type: impl Into<String>, input: Value) -> Self {
        let mut data = Map::new();
        data.insert("input".to_string(), input);
        Self::custom(payload_type, data)
    }

    pub fn error(error: impl Into<String>, cause: Option<String>) -> Self {
        MessagePayload::Error(ErrorPayload {
            error: error.into(),
            cause,
        })
    }

    /// Wire tag of this variant
    pub fn kind(&self) -> &str {
        match self {
            MessagePayload::Custom(_) => "custom",
            MessagePayload::Error(_) => "error",
            MessagePayload::AgentInfo(_) => "agent_info",
            MessagePayload::ProjectStructure(_) => "project_structure",
            MessagePayload::AgentDirectory(_) => "agent_directory",
            MessagePayload::Unknown { kind, .. } => kind,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomPayload> {
        match self {
            MessagePayload::Custom(p) => Some(p),
            _ => None,
        }
    }
}

/// Everything that travels on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum AgentMessage {
    /// `target_id: None` broadcasts to every matching subscriber
    Request {
        id: String,
        sender_id: String,
        #[serde(default)]
        target_id: Option<String>,
        message_type: String,
        payload: MessagePayload,
        #[serde(default)]
        metadata: Metadata,
    },
    /// `request_id` is the sole correlation mechanism
    Response {
        id: String,
        sender_id: String,
        request_id: String,
        success: bool,
        payload: MessagePayload,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        metadata: Metadata,
    },
    Event {
        id: String,
        sender_id: String,
        event_type: String,
        payload: MessagePayload,
        #[serde(default)]
        metadata: Metadata,
    },
    Ack {
        id: String,
        sender_id: String,
        request_id: String,
    },
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

fn stamped_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "timestamp".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    metadata
}

impl AgentMessage {
    /// Create a broadcast request
    pub fn request(
        sender_id: impl Into<String>,
        message_type: impl Into<String>,
        payload: MessagePayload,
    ) -> Self {
        AgentMessage::Request {
            id: new_message_id(),
            sender_id: sender_id.into(),
            target_id: None,
            message_type: message_type.into(),
            payload,
            metadata: stamped_metadata(),
        }
    }

    /// Address a request to one agent. No-op on other classes.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        if let AgentMessage::Request { target_id, .. } = &mut self {
            *target_id = Some(target.into());
        }
        self
    }

    /// Attach a metadata entry. No-op on `Ack`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        match &mut self {
            AgentMessage::Request { metadata, .. }
            | AgentMessage::Response { metadata, .. }
            | AgentMessage::Event { metadata, .. } => {
                metadata.insert(key.into(), value);
            }
            AgentMessage::Ack { .. } => {}
        }
        self
    }

    /// Create a response correlated with `request`
    pub fn response_to(
        request: &AgentMessage,
        sender_id: impl Into<String>,
        success: bool,
        payload: MessagePayload,
        error: Option<String>,
    ) -> Self {
        let mut metadata = stamped_metadata();
        if let Some(message_type) = request.message_type() {
            metadata.insert(
                "message_type".to_string(),
                Value::String(message_type.to_string()),
            );
        }
        AgentMessage::Response {
            id: new_message_id(),
            sender_id: sender_id.into(),
            request_id: request.id().to_string(),
            success,
            payload,
            error,
            metadata,
        }
    }

    pub fn success_response(
        request: &AgentMessage,
        sender_id: impl Into<String>,
        payload: MessagePayload,
    ) -> Self {
        Self::response_to(request, sender_id, true, payload, None)
    }

    /// Failed response carrying an `ErrorPayload` whose cause is the error code
    pub fn error_response(
        request: &AgentMessage,
        sender_id: impl Into<String>,
        error: &A2aError,
    ) -> Self {
        let text = error.to_string();
        Self::response_to(
            request,
            sender_id,
            false,
            MessagePayload::error(text.clone(), Some(error.code().to_string())),
            Some(text),
        )
    }

    pub fn event(
        sender_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: MessagePayload,
    ) -> Self {
        AgentMessage::Event {
            id: new_message_id(),
            sender_id: sender_id.into(),
            event_type: event_type.into(),
            payload,
            metadata: stamped_metadata(),
        }
    }

    /// Lightweight receipt for `request`
    pub fn ack(request: &AgentMessage, sender_id: impl Into<String>) -> Self {
        AgentMessage::Ack {
            id: new_message_id(),
            sender_id: sender_id.into(),
            request_id: request.id().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AgentMessage::Request { id, .. }
            | AgentMessage::Response { id, .. }
            | AgentMessage::Event { id, .. }
            | AgentMessage::Ack { id, .. } => id,
        }
    }

    pub fn sender_id(&self) -> &str {
        match self {
            AgentMessage::Request { sender_id, .. }
            | AgentMessage::Response { sender_id, .. }
            | AgentMessage::Event { sender_id, .. }
            | AgentMessage::Ack { sender_id, .. } => sender_id,
        }
    }

    pub fn class(&self) -> MessageClass {
        match self {
            AgentMessage::Request { .. } => MessageClass::Request,
            AgentMessage::Response { .. } => MessageClass::Response,
            AgentMessage::Event { .. } => MessageClass::Event,
            AgentMessage::Ack { .. } => MessageClass::Ack,
        }
    }

    /// Request message type or event type
    pub fn message_type(&self) -> Option<&str> {
        match self {
            AgentMessage::Request { message_type, .. } => Some(message_type),
            AgentMessage::Event { event_type, .. } => Some(event_type),
            _ => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            AgentMessage::Request { target_id, .. } => target_id.as_deref(),
            _ => None,
        }
    }

    /// Back-reference of a `Response` or `Ack`
    pub fn request_id(&self) -> Option<&str> {
        match self {
            AgentMessage::Response { request_id, .. } | AgentMessage::Ack { request_id, .. } => {
                Some(request_id)
            }
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&MessagePayload> {
        match self {
            AgentMessage::Request { payload, .. }
            | AgentMessage::Response { payload, .. }
            | AgentMessage::Event { payload, .. } => Some(payload),
            AgentMessage::Ack { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            AgentMessage::Request { metadata, .. }
            | AgentMessage::Response { metadata, .. }
            | AgentMessage::Event { metadata, .. } => Some(metadata),
            AgentMessage::Ack { .. } => None,
        }
    }

    /// True for a `Response` correlated with `request_id`
    pub fn is_response_to(&self, request_id: &str) -> bool {
        matches!(self, AgentMessage::Response { request_id: r, .. } if r == request_id)
    }

    /// True for a request that is broadcast or targeted at `agent_id`
    pub fn is_addressed_to(&self, agent_id: &str) -> bool {
        match self {
            AgentMessage::Request { target_id, .. } => {
                target_id.as_deref().map_or(true, |t| t == agent_id)
            }
            _ => false,
        }
    }

    /// `success` flag of a response; other classes report `false`
    pub fn is_success(&self) -> bool {
        matches!(self, AgentMessage::Response { success: true, .. })
    }

    /// `error` string of a failed response
    pub fn error(&self) -> Option<&str> {
        match self {
            AgentMessage::Response { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids_are_unique() {
        let a = AgentMessage::request("cli", "X_REQUEST", MessagePayload::error("e", None));
        let b = AgentMessage::request("cli", "X_REQUEST", MessagePayload::error("e", None));
        assert_ne!(a.id(), b.id());
        assert!(a.metadata().unwrap().contains_key("timestamp"));
    }

    #[test]
    fn test_response_correlates_with_request() {
        let request = AgentMessage::request(
            "cli",
            message_types::OPEN_FILE_REQUEST,
            MessagePayload::custom_input("open", json!({})),
        )
        .with_target("open-file");

        assert_eq!(request.target_id(), Some("open-file"));
        assert!(request.is_addressed_to("open-file"));
        assert!(!request.is_addressed_to("file-data"));

        let response = AgentMessage::error_response(
            &request,
            "open-file",
            &A2aError::ValidationFailed("missing request".into()),
        );
        assert!(response.is_response_to(request.id()));
        assert!(!response.is_success());
        assert_eq!(response.class(), MessageClass::Response);
        match response.payload() {
            Some(MessagePayload::Error(e)) => {
                assert_eq!(e.cause.as_deref(), Some("validation_failed"))
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_payload_kind_decodes_gracefully() {
        let raw = json!({ "kind": "telemetry_v9", "samples": [1, 2, 3] });
        let payload: MessagePayload = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(payload.kind(), "telemetry_v9");
        assert!(matches!(payload, MessagePayload::Unknown { .. }));
        assert_eq!(serde_json::to_value(&payload).unwrap(), raw);
    }

    #[test]
    fn test_message_serialization_tags() {
        let msg = AgentMessage::event(
            "scanner",
            message_types::AGENT_INFO_EVENT,
            MessagePayload::custom("info", Map::new()),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["class"], "event");
        assert_eq!(json["payload"]["kind"], "custom");
        assert_eq!(json["payload"]["type"], "info");

        let back: AgentMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_response_type_suffixes() {
        use message_types::*;
        assert_eq!(
            response_type_for(CODE_GENERATION_REQUEST),
            "CODE_GENERATION_RESPONSE"
        );
        assert_eq!(error_type_for(OPEN_FILE_REQUEST), "OPEN_FILE_ERROR");
        assert_eq!(response_type_for("PING"), "PING_RESPONSE");
    }

    #[test]
    fn test_ack_references_request() {
        let request = AgentMessage::request("cli", "X_REQUEST", MessagePayload::error("e", None));
        let ack = AgentMessage::ack(&request, "worker");
        assert_eq!(ack.request_id(), Some(request.id()));
        assert!(ack.payload().is_none());
    }
}
