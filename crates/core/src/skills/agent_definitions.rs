//! # Agent Definitions
//!
//! Composes bus agents from skills. Tool skills are wrapped in a
//! [`LegacyAgentAdapter`]; native agents are constructed directly.

use std::sync::Arc;

use crate::agents::{OrchestratorAgent, ProjectScannerAgent};
use crate::config::FabricConfig;
use crate::models::LanguageModel;
use crate::skills::{CodeGeneratorSkill, EmbeddingIndexSkill, FileDataSkill, OpenFileSkill};
use crate::swarm::a2a_bridge::LegacyAgentAdapter;
use crate::swarm::agent::A2aAgent;
use crate::swarm::message::message_types::*;

pub const CODE_GENERATOR_ID: &str = "code-generator";
pub const OPEN_FILE_ID: &str = "open-file";
pub const FILE_DATA_ID: &str = "file-data";
pub const EMBEDDING_INDEX_ID: &str = "embedding-index";
pub const PROJECT_SCANNER_ID: &str = "project-scanner";
pub const ORCHESTRATOR_ID: &str = "orchestrator";

/// The Code Generator Agent
///
/// One legacy generator serving all four generation request types; the
/// adapter tells them apart through `request_subtype`.
pub fn code_generator_agent(
    config: &FabricConfig,
    model: Arc<dyn LanguageModel>,
) -> Arc<LegacyAgentAdapter<CodeGeneratorSkill>> {
    Arc::new(
        LegacyAgentAdapter::new(
            CODE_GENERATOR_ID,
            CodeGeneratorSkill::new(config.model.clone(), model),
            [
                CODE_GENERATION_REQUEST,
                CLASS_GENERATION_REQUEST,
                FUNCTION_GENERATION_REQUEST,
                ALGORITHM_GENERATION_REQUEST,
            ],
        )
        .with_max_concurrency(config.max_concurrent_requests),
    )
}

pub fn open_file_agent(config: &FabricConfig) -> Arc<LegacyAgentAdapter<OpenFileSkill>> {
    Arc::new(
        LegacyAgentAdapter::new(
            OPEN_FILE_ID,
            OpenFileSkill::new(config.file_access.clone()),
            [OPEN_FILE_REQUEST],
        )
        .with_max_concurrency(config.max_concurrent_requests),
    )
}

pub fn file_data_agent(config: &FabricConfig) -> Arc<LegacyAgentAdapter<FileDataSkill>> {
    Arc::new(
        LegacyAgentAdapter::new(
            FILE_DATA_ID,
            FileDataSkill::new(config.file_access.clone(), config.default_max_files),
            [FILE_DATA_REQUEST],
        )
        .with_max_concurrency(config.max_concurrent_requests),
    )
}

pub fn embedding_index_agent(
    config: &FabricConfig,
) -> Arc<LegacyAgentAdapter<EmbeddingIndexSkill>> {
    Arc::new(
        LegacyAgentAdapter::new(
            EMBEDDING_INDEX_ID,
            EmbeddingIndexSkill::new(config.file_access.clone(), config.default_max_files),
            [EMBEDDING_INDEX_REQUEST],
        )
        .with_max_concurrency(config.max_concurrent_requests),
    )
}

pub fn project_scanner_agent(config: &FabricConfig) -> Arc<ProjectScannerAgent> {
    Arc::new(ProjectScannerAgent::new(
        PROJECT_SCANNER_ID,
        config.file_access.clone(),
        config.default_max_files,
    ))
}

/// The Orchestrator Agent
///
/// Spawn it before the others so it hears their announcements first hand.
pub fn orchestrator_agent() -> Arc<OrchestratorAgent> {
    Arc::new(OrchestratorAgent::new(ORCHESTRATOR_ID))
}

/// Every bundled worker agent (the orchestrator is created separately)
pub fn create_standard_agents(
    config: &FabricConfig,
    model: Arc<dyn LanguageModel>,
) -> Vec<Arc<dyn A2aAgent>> {
    vec![
        code_generator_agent(config, model) as Arc<dyn A2aAgent>,
        open_file_agent(config) as Arc<dyn A2aAgent>,
        file_data_agent(config) as Arc<dyn A2aAgent>,
        embedding_index_agent(config) as Arc<dyn A2aAgent>,
        project_scanner_agent(config) as Arc<dyn A2aAgent>,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TemplateModel;
    use crate::swarm::routing::SUBTYPES;
    use std::collections::BTreeSet;

    #[test]
    fn test_standard_agents_cover_every_request_type() {
        let agents = create_standard_agents(&FabricConfig::default(), Arc::new(TemplateModel));
        let covered: BTreeSet<&str> = agents
            .iter()
            .flat_map(|a| a.supported_message_types().iter().map(String::as_str))
            .collect();
        for (message_type, _) in SUBTYPES {
            assert!(covered.contains(message_type), "{} is not served", message_type);
        }

        let ids: BTreeSet<&str> = agents.iter().map(|a| a.agent_id()).collect();
        assert_eq!(ids.len(), agents.len());
    }

    #[test]
    fn test_adapters_report_legacy_class() {
        let agent = open_file_agent(&FabricConfig::default());
        assert_eq!(agent.legacy_agent_class(), Some("OpenFileAgent"));
        assert_eq!(agent.agent_info().agent_type, "open_file");
    }
}
