//! Project structure scanner.
//!
//! Answers `PROJECT_STRUCTURE_REQUEST` with a typed `ProjectStructure`
//! payload. Input mirrors the tool agents: `project_path` (defaults to the
//! configured base directory) and `max_files`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;

use crate::config::FileAccessConfig;
use crate::error::{A2aError, A2aResult};
use crate::swarm::a2a_bridge::extract_input;
use crate::swarm::agent::A2aAgent;
use crate::swarm::message::{message_types, AgentMessage, MessagePayload, ProjectStructurePayload};
use crate::tools::{file_access, scanner};

pub struct ProjectScannerAgent {
    agent_id: String,
    supported: BTreeSet<String>,
    access: FileAccessConfig,
    default_max_files: usize,
}

impl ProjectScannerAgent {
    pub fn new(
        agent_id: impl Into<String>,
        access: FileAccessConfig,
        default_max_files: usize,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            supported: [message_types::PROJECT_STRUCTURE_REQUEST.to_string()]
                .into_iter()
                .collect(),
            access,
            default_max_files,
        }
    }

    async fn scan(&self, request: &AgentMessage) -> A2aResult<ProjectStructurePayload> {
        let input = extract_input(request)?;
        let raw = input
            .get_string("project_path")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(".");
        let root = file_access::resolve_dir(&self.access, raw)
            .map_err(|e| A2aError::ValidationFailed(format!("{:#}", e)))?;
        let max_files = match input.get("max_files") {
            None => self.default_max_files,
            Some(_) => match input.get_int("max_files") {
                Some(n) if n > 0 => n as usize,
                _ => {
                    return Err(A2aError::ValidationFailed(
                        "max_files must be a positive integer".into(),
                    ))
                }
            },
        };

        let scan = tokio::task::spawn_blocking(move || scanner::scan_project(&root, max_files))
            .await
            .map_err(|e| A2aError::ProcessingError(format!("scan task failed: {}", e)))?
            .map_err(|e| A2aError::ProcessingError(format!("{:#}", e)))?;

        Ok(ProjectStructurePayload {
            root: scan.root.to_string_lossy().to_string(),
            files: scan.files,
            directories: scan.directories,
            project_type: scan.project_type.to_string(),
            total_files: scan.total_files,
            truncated: scan.truncated,
            scanned_at: Utc::now(),
        })
    }
}

#[async_trait]
impl A2aAgent for ProjectScannerAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn agent_type(&self) -> &str {
        "project_scanner"
    }

    fn supported_message_types(&self) -> &BTreeSet<String> {
        &self.supported
    }

    async fn handle_request(&self, request: &AgentMessage) -> AgentMessage {
        match self.scan(request).await {
            Ok(structure) => {
                tracing::info!(agent_id = %self.agent_id, project_type = %structure.project_type, files = structure.total_files, "Project scanned");
                AgentMessage::success_response(
                    request,
                    &self.agent_id,
                    MessagePayload::ProjectStructure(structure),
                )
            }
            Err(e) => {
                tracing::warn!(agent_id = %self.agent_id, error = %e, "Project scan failed");
                AgentMessage::error_response(request, &self.agent_id, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent(dir: &std::path::Path) -> ProjectScannerAgent {
        ProjectScannerAgent::new(
            "scanner",
            FileAccessConfig {
                base_dir: dir.to_path_buf(),
                ..FileAccessConfig::default()
            },
            100,
        )
    }

    fn request(input: serde_json::Value) -> AgentMessage {
        AgentMessage::request(
            "tester",
            message_types::PROJECT_STRUCTURE_REQUEST,
            MessagePayload::custom_input("scan", input),
        )
    }

    #[tokio::test]
    async fn test_scan_returns_structure_payload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module demo").unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let response = agent(dir.path()).handle_request(&request(json!({}))).await;
        assert!(response.is_success());
        match response.payload() {
            Some(MessagePayload::ProjectStructure(p)) => {
                assert_eq!(p.project_type, "go");
                assert_eq!(p.total_files, 2);
                assert_eq!(p.files, vec!["go.mod".to_string(), "main.go".to_string()]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let response = agent(dir.path())
            .handle_request(&request(json!({"max_files": 0})))
            .await;
        assert!(!response.is_success());
        assert!(response.error().unwrap().contains("max_files"));
    }

    #[tokio::test]
    async fn test_path_outside_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = agent(dir.path())
            .handle_request(&request(json!({"project_path": "../"})))
            .await;
        assert!(!response.is_success());
        match response.payload() {
            Some(MessagePayload::Error(e)) => {
                assert_eq!(e.cause.as_deref(), Some("validation_failed"))
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
