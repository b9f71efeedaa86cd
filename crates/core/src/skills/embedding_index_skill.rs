//! # Embedding Index Skill
//!
//! Builds a keyword index over a project and optionally answers a query
//! against it. Stands in for a vector index: same inputs and output shape,
//! term frequencies instead of embeddings.

use serde_json::json;

use crate::config::FileAccessConfig;
use crate::skills::step::{
    ExecutionContext, StepInput, StepOutput, StepResult, ToolAgent, ToolPlanStep, ValidationResult,
};
use crate::tools::{file_access, scanner};

const TOP_TERMS: usize = 20;
const MAX_MATCHES: usize = 10;

pub struct EmbeddingIndexSkill {
    access: FileAccessConfig,
    default_max_files: usize,
}

impl EmbeddingIndexSkill {
    pub fn new(access: FileAccessConfig, default_max_files: usize) -> Self {
        Self {
            access,
            default_max_files,
        }
    }
}

impl ToolAgent for EmbeddingIndexSkill {
    fn agent_type(&self) -> &str {
        "embedding_index"
    }

    fn legacy_class(&self) -> &str {
        "EmbeddingIndexAgent"
    }

    fn validate_input(&self, input: &StepInput) -> ValidationResult {
        if input.contains("max_files") && !input.get_int("max_files").is_some_and(|n| n > 0) {
            return ValidationResult::invalid(vec![
                "Parameter 'max_files' must be a positive integer".to_string(),
            ]);
        }
        ValidationResult::ok()
    }

    fn execute_step(&self, step: &ToolPlanStep, context: &ExecutionContext) -> StepResult {
        let input = &step.input;
        let raw = input
            .get_string("project_path")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(".");
        let root = match file_access::resolve_dir(&self.access, raw) {
            Ok(root) => root,
            Err(e) => {
                return StepResult::failure(format!("Invalid project path: {:#}", e))
                    .with_metadata("error_code", "validation_failed")
            }
        };
        let max_files = input
            .get_int("max_files")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(self.default_max_files);
        let extensions = input.get_string_list("extensions").unwrap_or_default();

        let index = scanner::build_keyword_index(&root, max_files, &extensions, &self.access);
        let index = match index {
            Ok(index) => index,
            Err(e) => {
                return StepResult::failure(format!("Indexing failed: {:#}", e))
                    .with_metadata("error_code", "processing_error")
            }
        };
        tracing::info!(request_id = %context.request_id, files = index.document_count(), terms = index.unique_terms(), "Built keyword index");

        let top_terms: Vec<_> = index
            .top_terms(TOP_TERMS)
            .into_iter()
            .map(|(term, count)| json!({ "term": term, "count": count }))
            .collect();

        let mut output = StepOutput::new()
            .with("project_path", root.to_string_lossy().to_string())
            .with("indexed_files", index.document_count())
            .with("unique_terms", index.unique_terms())
            .with("top_terms", top_terms);

        if let Some(query) = input.get_string("query").filter(|q| !q.trim().is_empty()) {
            let matches: Vec<_> = index
                .search(query)
                .into_iter()
                .take(MAX_MATCHES)
                .map(|(path, score)| json!({ "path": path.to_string_lossy(), "score": score }))
                .collect();
            output.insert("query", query);
            output.insert("matches", matches);
        }

        StepResult::success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(dir: &std::path::Path, input: StepInput) -> StepResult {
        let skill = EmbeddingIndexSkill::new(
            FileAccessConfig {
                base_dir: dir.to_path_buf(),
                ..FileAccessConfig::default()
            },
            50,
        );
        let step = ToolPlanStep {
            id: "s".into(),
            title: "index".into(),
            description: String::new(),
            agent_type: "embedding_index".into(),
            input,
        };
        skill.execute_step(&step, &ExecutionContext::default())
    }

    #[test]
    fn test_index_and_query() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bus.rs"), "publish publish subscribe").unwrap();
        std::fs::write(dir.path().join("agent.rs"), "subscribe handle").unwrap();

        let result = run(dir.path(), StepInput::new().with("query", "publish"));
        assert!(result.success);
        assert_eq!(result.output.get_int("indexed_files"), Some(2));
        assert_eq!(result.output.get_int("unique_terms"), Some(3));

        let matches = result.output.get_list("matches").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["path"], "bus.rs");
        assert_eq!(matches[0]["score"], 2);
    }

    #[test]
    fn test_no_query_means_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha beta").unwrap();
        let result = run(dir.path(), StepInput::new());
        assert!(result.success);
        assert!(!result.output.contains("matches"));
    }
}
