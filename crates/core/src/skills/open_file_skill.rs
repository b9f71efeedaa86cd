//! # Open File Skill
//!
//! Reads one file through the access guard. `request` carries the path.

use crate::config::FileAccessConfig;
use crate::skills::step::{
    require_string, ExecutionContext, StepInput, StepOutput, StepResult, ToolAgent, ToolPlanStep,
    ValidationResult,
};
use crate::tools::file_access;

pub struct OpenFileSkill {
    access: FileAccessConfig,
}

impl OpenFileSkill {
    pub fn new(access: FileAccessConfig) -> Self {
        Self { access }
    }
}

impl ToolAgent for OpenFileSkill {
    fn agent_type(&self) -> &str {
        "open_file"
    }

    fn legacy_class(&self) -> &str {
        "OpenFileAgent"
    }

    fn validate_input(&self, input: &StepInput) -> ValidationResult {
        let mut errors = Vec::new();
        require_string(input, "request", &mut errors);
        if errors.is_empty() {
            ValidationResult::ok()
        } else {
            ValidationResult::invalid(errors)
        }
    }

    fn execute_step(&self, step: &ToolPlanStep, context: &ExecutionContext) -> StepResult {
        let Some(raw) = step.input.get_string("request") else {
            return StepResult::failure("Missing required parameter: request")
                .with_metadata("error_code", "validation_failed");
        };

        match file_access::read_file(&self.access, raw) {
            Ok(file) => {
                tracing::debug!(request_id = %context.request_id, path = ?file.path, size = file.size, "Opened file");
                StepResult::success(
                    StepOutput::new()
                        .with("path", file.path.to_string_lossy().to_string())
                        .with("content", file.content)
                        .with("size", file.size)
                        .with("line_count", file.line_count)
                        .with("mime_type", file.mime_type)
                        .with("checksum", file.checksum),
                )
            }
            Err(e) => StepResult::failure(format!("Failed to open '{}': {:#}", raw.trim(), e))
                .with_metadata("error_code", "processing_error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(dir: &std::path::Path) -> OpenFileSkill {
        OpenFileSkill::new(FileAccessConfig {
            base_dir: dir.to_path_buf(),
            ..FileAccessConfig::default()
        })
    }

    fn step(input: StepInput) -> ToolPlanStep {
        ToolPlanStep {
            id: "s".into(),
            title: "open".into(),
            description: String::new(),
            agent_type: "open_file".into(),
            input,
        }
    }

    #[test]
    fn test_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let result = skill(dir.path()).execute_step(
            &step(StepInput::new().with("request", "main.rs")),
            &ExecutionContext::default(),
        );
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output.get_string("content"), Some("fn main() {}\n"));
        assert_eq!(result.output.get_int("line_count"), Some(1));
        assert_eq!(result.output.get_string("checksum").unwrap().len(), 64);
    }

    #[test]
    fn test_missing_request_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let validation = skill(dir.path()).validate_input(&StepInput::new());
        assert!(!validation.valid);
        assert_eq!(validation.errors, vec!["Missing required parameter: request"]);
    }

    #[test]
    fn test_traversal_is_a_failure_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let result = skill(dir.path()).execute_step(
            &step(StepInput::new().with("request", "../outside.txt")),
            &ExecutionContext::default(),
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("traversal"));
    }
}
