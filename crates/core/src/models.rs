//! # Switchboard Models
//!
//! Language-model selection and the collaborator contract used by the code
//! generation skill.
//!
//! The provider client itself lives outside the fabric: hosts plug one in by
//! implementing [`LanguageModel`]. [`TemplateModel`] is the offline fallback
//! that produces compilable skeletons without any network access.

use serde::{Deserialize, Serialize};

/// Configuration for LLM model selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider label, informational only (e.g. "anthropic", "template")
    pub provider: String,
    /// Model name reported in generated output metadata
    pub model: String,
    /// Upper bound on generated tokens passed to the provider
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "template".to_string(),
            model: "template-v1".to_string(),
            max_tokens: 2048,
        }
    }
}

impl ModelConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Self::default()
        }
    }
}

/// A single completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub language: String,
    pub subtype: String,
    pub max_tokens: u32,
}

/// Blocking completion client.
///
/// Implementations may perform network I/O; callers run them on the
/// blocking pool.
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

/// Deterministic offline model that answers with a fenced skeleton
#[derive(Debug, Clone, Default)]
pub struct TemplateModel;

impl LanguageModel for TemplateModel {
    fn name(&self) -> &str {
        "template"
    }

    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let summary = request.prompt.lines().last().unwrap_or_default().trim();
        let body = skeleton(&request.language, &request.subtype, summary);
        Ok(format!(
            "Skeleton {} for: {}\n\n```{}\n{}\n```",
            request.subtype, summary, request.language, body
        ))
    }
}

fn skeleton(language: &str, subtype: &str, summary: &str) -> String {
    let name = if subtype == "class" { "Solution" } else { "solution" };
    match language.to_lowercase().as_str() {
        "go" => format!("// {summary}\nfunc {}() {{\n}}", capitalize(name)),
        "python" => format!("# {summary}\ndef {name}():\n    pass"),
        "kotlin" => format!("// {summary}\nfun {name}() {{\n}}"),
        "java" => format!("// {summary}\npublic class Solution {{\n}}"),
        "typescript" | "javascript" => format!("// {summary}\nexport function {name}() {{\n}}"),
        _ => format!("// {summary}\npub fn {name}() {{\n}}"),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, "template");
        assert_eq!(config.max_tokens, 2048);
    }

    #[test]
    fn test_template_model_fences_language() {
        let request = CompletionRequest {
            system_prompt: String::new(),
            prompt: "Language: go\nsort a list".to_string(),
            language: "go".to_string(),
            subtype: "code".to_string(),
            max_tokens: 100,
        };
        let text = TemplateModel.complete(&request).unwrap();
        assert!(text.contains("```go"));
        assert!(text.contains("func Solution()"));
        assert!(text.contains("sort a list"));
    }
}
