//! # Code Generator Skill
//!
//! Tool agent behind the four generation request types. Builds a prompt,
//! asks the configured [`LanguageModel`] and pulls the first fenced code
//! block out of the answer.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{CompletionRequest, LanguageModel, ModelConfig, TemplateModel};
use crate::skills::prompts;
use crate::skills::step::{
    require_string, ExecutionContext, StepInput, StepOutput, StepResult, ToolAgent, ToolPlanStep,
    ValidationResult,
};

const DEFAULT_LANGUAGE: &str = "rust";
const DEFAULT_SUBTYPE: &str = "code";

/// Output of one generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedCode {
    pub generated_code: String,
    pub language: String,
    pub request_subtype: String,
    /// Prose that preceded the code block
    pub explanation: String,
}

/// Split a model answer into (code, explanation).
///
/// Without a fence the whole answer is treated as code.
pub fn extract_code_block(text: &str) -> Result<(String, String)> {
    let fence = Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```")?;
    match fence.captures(text) {
        Some(caps) => {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let code = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            Ok((
                code.trim_end().to_string(),
                text[..start].trim().to_string(),
            ))
        }
        None => Ok((text.trim().to_string(), String::new())),
    }
}

/// Code generation backed by a pluggable model
pub struct CodeGeneratorSkill {
    config: ModelConfig,
    model: Arc<dyn LanguageModel>,
}

impl CodeGeneratorSkill {
    pub fn new(config: ModelConfig, model: Arc<dyn LanguageModel>) -> Self {
        Self { config, model }
    }

    /// Uses the offline [`TemplateModel`]
    pub fn offline(config: ModelConfig) -> Self {
        Self::new(config, Arc::new(TemplateModel))
    }

    pub fn generate(&self, request: &str, language: &str, subtype: &str) -> Result<GeneratedCode> {
        let completion = CompletionRequest {
            system_prompt: prompts::for_subtype(subtype).to_string(),
            prompt: format!(
                "Language: {}\nRequest type: {}\n{}",
                language,
                subtype,
                request.trim()
            ),
            language: language.to_string(),
            subtype: subtype.to_string(),
            max_tokens: self.config.max_tokens,
        };

        let answer = self.model.complete(&completion)?;
        let (generated_code, explanation) = extract_code_block(&answer)?;
        Ok(GeneratedCode {
            generated_code,
            language: language.to_string(),
            request_subtype: subtype.to_string(),
            explanation,
        })
    }
}

impl ToolAgent for CodeGeneratorSkill {
    fn agent_type(&self) -> &str {
        "code_generator"
    }

    fn legacy_class(&self) -> &str {
        "CodeGeneratorAgent"
    }

    fn validate_input(&self, input: &StepInput) -> ValidationResult {
        let mut errors = Vec::new();
        require_string(input, "request", &mut errors);
        if input.contains("language") && input.get_string("language").is_none() {
            errors.push("Parameter 'language' must be a string".to_string());
        }
        if errors.is_empty() {
            ValidationResult::ok()
        } else {
            ValidationResult::invalid(errors)
        }
    }

    fn execute_step(&self, step: &ToolPlanStep, context: &ExecutionContext) -> StepResult {
        let Some(request) = step.input.get_string("request") else {
            return StepResult::failure("Missing required parameter: request")
                .with_metadata("error_code", "validation_failed");
        };
        let language = step
            .input
            .get_string("language")
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_lowercase();
        let subtype = step
            .input
            .get_string("request_subtype")
            .unwrap_or(DEFAULT_SUBTYPE);

        tracing::info!(request_id = %context.request_id, language = %language, subtype = %subtype, model = %self.model.name(), "Generating code");

        match self.generate(request, &language, subtype) {
            Ok(generated) if generated.generated_code.trim().is_empty() => {
                StepResult::failure("Model returned no code")
                    .with_metadata("error_code", "generation_failed")
            }
            Ok(generated) => StepResult::success(
                StepOutput::new()
                    .with("generated_code", generated.generated_code)
                    .with("language", generated.language)
                    .with("request_subtype", generated.request_subtype)
                    .with("explanation", generated.explanation),
            )
            .with_metadata("model", self.config.model.clone())
            .with_metadata("provider", self.config.provider.clone()),
            Err(e) => StepResult::failure(format!("Code generation failed: {:#}", e))
                .with_metadata("error_code", "generation_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel(&'static str);

    impl LanguageModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            if self.0 == "error" {
                anyhow::bail!("provider unavailable");
            }
            Ok(self.0.to_string())
        }
    }

    fn step(input: StepInput) -> ToolPlanStep {
        ToolPlanStep {
            id: "step-1".into(),
            title: "t".into(),
            description: "d".into(),
            agent_type: "code_generator".into(),
            input,
        }
    }

    fn fixed(answer: &'static str) -> CodeGeneratorSkill {
        CodeGeneratorSkill::new(ModelConfig::default(), Arc::new(FixedModel(answer)))
    }

    #[test]
    fn test_extract_code_block() {
        let (code, explanation) =
            extract_code_block("Sorts it.\n\n```go\nfunc Sort() {}\n```\ntrailing").unwrap();
        assert_eq!(code, "func Sort() {}");
        assert_eq!(explanation, "Sorts it.");

        let (code, explanation) = extract_code_block("  plain text  ").unwrap();
        assert_eq!(code, "plain text");
        assert!(explanation.is_empty());
    }

    #[test]
    fn test_generates_requested_language() {
        let skill = CodeGeneratorSkill::offline(ModelConfig::default());
        let input = StepInput::new()
            .with("request", "sort a list")
            .with("language", "Go")
            .with("request_subtype", "function");

        let result = skill.execute_step(&step(input), &ExecutionContext::default());
        assert!(result.success);
        assert_eq!(result.output.get_string("language"), Some("go"));
        assert_eq!(result.output.get_string("request_subtype"), Some("function"));
        assert!(result.output.get_string("generated_code").unwrap().contains("func"));
        assert_eq!(result.metadata["model"], "template-v1");
    }

    #[test]
    fn test_language_defaults_to_rust() {
        let skill = CodeGeneratorSkill::offline(ModelConfig::default());
        let input = StepInput::new().with("request", "parse a header");
        let result = skill.execute_step(&step(input), &ExecutionContext::default());
        assert_eq!(result.output.get_string("language"), Some("rust"));
        assert!(result.output.get_string("generated_code").unwrap().contains("pub fn"));
    }

    #[test]
    fn test_validation() {
        let skill = fixed("x");
        assert!(skill.validate_input(&StepInput::new().with("request", "x")).valid);

        let invalid = skill.validate_input(&StepInput::new().with("language", 3));
        assert!(!invalid.valid);
        assert_eq!(invalid.errors.len(), 2);
        assert_eq!(invalid.errors[0], "Missing required parameter: request");
    }

    #[test]
    fn test_empty_answer_is_generation_failure() {
        let result = fixed("```rust\n\n```").execute_step(
            &step(StepInput::new().with("request", "x")),
            &ExecutionContext::default(),
        );
        assert!(!result.success);
        assert_eq!(result.metadata["error_code"], "generation_failed");
    }

    #[test]
    fn test_model_error_is_reported() {
        let result = fixed("error").execute_step(
            &step(StepInput::new().with("request", "x")),
            &ExecutionContext::default(),
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("provider unavailable"));
    }
}
