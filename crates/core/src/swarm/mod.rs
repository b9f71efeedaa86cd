//! # Swarm Fabric
//!
//! The agent-to-agent message fabric.
//!
//! ## Message Flow
//!
//! ```text
//! requester ──publish(Request)──▶ MessageBus ──predicate match──▶ agent inbox
//!     ▲                                                              │
//!     └──── Response{request_id} ◀──publish── handle_request ◀───────┘
//! ```
//!
//! - `message` - Messages, payloads and the type taxonomy
//! - `bus` - Predicate pub/sub with per-subscriber FIFO delivery
//! - `agent` / `lifecycle` / `supervisor` - The A2A capability and its supervision
//! - `a2a_bridge` - Adapter for synchronous tool agents
//! - `correlation` - Request/reply over the bus
//! - `routing` - Request type to legacy subtype table

pub mod a2a_bridge;
pub mod agent;
pub mod bus;
pub mod correlation;
pub mod lifecycle;
pub mod message;
pub mod routing;
pub mod supervisor;

pub use a2a_bridge::{extract_input, LegacyAgentAdapter};
pub use agent::{A2aAgent, AgentContext};
pub use bus::{MessageBus, Subscription, SubscriptionId};
pub use correlation::ReplyPolicy;
pub use lifecycle::{AgentState, Lifecycle};
pub use message::{
    message_types, AgentDirectoryPayload, AgentInfoPayload, AgentMessage, CustomPayload,
    ErrorPayload, MessageClass, MessagePayload, Metadata, ProjectStructurePayload,
};
pub use supervisor::{AgentHandle, AgentSupervisor, Swarm};
