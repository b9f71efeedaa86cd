//! # Skills
//!
//! Synchronous tool agents and the factories that put them on the bus.
//!
//! ## Architecture
//!
//! ```text
//! A2aAgent (bus participant)
//!   └── LegacyAgentAdapter
//!         └── ToolAgent (validate_input + execute_step)
//! ```
//!
//! **Generation:**
//! - `CodeGeneratorSkill` - Code, class, function and algorithm generation
//!
//! **Files:**
//! - `OpenFileSkill` - Read one guarded file
//! - `FileDataSkill` - Collect files from a project
//! - `EmbeddingIndexSkill` - Keyword index and lookup

pub mod prompts;
pub mod step;

pub mod code_generator_skill;
pub mod embedding_index_skill;
pub mod file_data_skill;
pub mod open_file_skill;

// Agent Definitions (compose skills into agents)
pub mod agent_definitions;

pub use code_generator_skill::{CodeGeneratorSkill, GeneratedCode};
pub use embedding_index_skill::EmbeddingIndexSkill;
pub use file_data_skill::{FileDataSkill, FileEntry};
pub use open_file_skill::OpenFileSkill;
pub use step::{
    ExecutionContext, StepInput, StepOutput, StepResult, StepValue, ToolAgent, ToolPlanStep,
    ValidationResult,
};

pub use agent_definitions::{
    code_generator_agent, create_standard_agents, embedding_index_agent, file_data_agent,
    open_file_agent, orchestrator_agent, project_scanner_agent,
};
