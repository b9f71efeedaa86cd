//! # Switchboard Core
//!
//! An in-process agent-to-agent (A2A) message fabric: typed messages, a
//! predicate pub/sub bus, supervised agents, an adapter for synchronous
//! tool agents, and request/reply correlation.
//!
//! ## Architecture
//!
//! - `swarm/` - Messages, bus, agent capability, supervision, correlation
//! - `skills/` - Synchronous tool agents and agent factories
//! - `agents/` - Native agents (project scanner, orchestrator)
//! - `tools/` - File access guard and project scanning
//! - `models` - Language model contract used by code generation
//! - `config` - Fabric configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use switchboard_core::swarm::{correlation, MessageBus, Swarm};
//!
//! let mut swarm = Swarm::new(MessageBus::new(), FabricConfig::default());
//! for agent in create_standard_agents(swarm.config(), Arc::new(TemplateModel)) {
//!     swarm.spawn(agent)?;
//! }
//! swarm.wait_until_ready().await?;
//! let response = correlation::request(swarm.bus(), request, timeout).await?;
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod models;
pub mod skills;
pub mod swarm;
pub mod tools;

pub use config::{FabricConfig, FileAccessConfig};
pub use error::{A2aError, A2aResult, BusError};
