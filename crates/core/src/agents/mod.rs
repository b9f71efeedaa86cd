//! # Native Agents
//!
//! Agents written directly against the A2A capability, without a legacy
//! tool behind them.
//!
//! - `ProjectScannerAgent` - Answers `PROJECT_STRUCTURE_REQUEST` with a structure payload
//! - `OrchestratorAgent` - Tracks announcements and routes work to capable agents

pub mod orchestrator;
pub mod project_scanner;

pub use orchestrator::OrchestratorAgent;
pub use project_scanner::ProjectScannerAgent;
