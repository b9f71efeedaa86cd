//! # File Data Skill
//!
//! Collects up to `max_files` files from a project directory, optionally
//! with their contents.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::FileAccessConfig;
use crate::skills::step::{
    ExecutionContext, StepInput, StepOutput, StepResult, ToolAgent, ToolPlanStep, ValidationResult,
};
use crate::tools::file_access;

/// One collected file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub max_files: usize,
    pub extensions: Vec<String>,
    pub include_content: bool,
    /// Contents of larger files are omitted
    pub max_file_size: u64,
}

/// Files under `root` in path order; stops after `max_files`.
///
/// Files the access allow-list refuses are neither listed nor read.
/// Returns the entries and whether more matching files existed.
pub fn collect_files(
    root: &Path,
    options: &CollectOptions,
    access: &FileAccessConfig,
) -> Result<(Vec<FileEntry>, bool)> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !file_access::is_extension_allowed(access, path) {
            continue;
        }
        if !options.extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if !options
                .extensions
                .iter()
                .any(|x| x.trim_start_matches('.').eq_ignore_ascii_case(ext))
            {
                continue;
            }
        }
        if files.len() == options.max_files {
            return Ok((files, true));
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let content = if options.include_content && size <= options.max_file_size {
            std::fs::read_to_string(path).ok()
        } else {
            None
        };
        files.push(FileEntry {
            path: path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/"),
            size,
            content,
        });
    }
    Ok((files, false))
}

pub struct FileDataSkill {
    access: FileAccessConfig,
    default_max_files: usize,
}

impl FileDataSkill {
    pub fn new(access: FileAccessConfig, default_max_files: usize) -> Self {
        Self {
            access,
            default_max_files,
        }
    }

    fn project_root(&self, input: &StepInput) -> Result<PathBuf> {
        let raw = input
            .get_string("project_path")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(".");
        file_access::resolve_dir(&self.access, raw)
    }
}

impl ToolAgent for FileDataSkill {
    fn agent_type(&self) -> &str {
        "file_data"
    }

    fn legacy_class(&self) -> &str {
        "FileDataAgent"
    }

    fn validate_input(&self, input: &StepInput) -> ValidationResult {
        let mut errors = Vec::new();
        if input.contains("max_files") && !input.get_int("max_files").is_some_and(|n| n > 0) {
            errors.push("Parameter 'max_files' must be a positive integer".to_string());
        }
        if input.contains("extensions") && input.get_list("extensions").is_none() {
            errors.push("Parameter 'extensions' must be a list".to_string());
        }
        if errors.is_empty() {
            ValidationResult::ok()
        } else {
            ValidationResult::invalid(errors)
        }
    }

    fn execute_step(&self, step: &ToolPlanStep, context: &ExecutionContext) -> StepResult {
        let input = &step.input;
        let max_files = input
            .get_int("max_files")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(self.default_max_files);

        let root = match self.project_root(input) {
            Ok(root) => root,
            Err(e) => {
                return StepResult::failure(format!("Invalid project path: {:#}", e))
                    .with_metadata("error_code", "validation_failed")
            }
        };

        let options = CollectOptions {
            max_files,
            extensions: input.get_string_list("extensions").unwrap_or_default(),
            include_content: input.get_bool("include_content").unwrap_or(false),
            max_file_size: self.access.max_file_size as u64,
        };

        match collect_files(&root, &options, &self.access) {
            Ok((files, truncated)) => {
                tracing::debug!(request_id = %context.request_id, root = ?root, count = files.len(), truncated, "Collected files");
                let total = files.len();
                let files = match serde_json::to_value(&files) {
                    Ok(v) => v,
                    Err(e) => return StepResult::failure(format!("Failed to encode files: {}", e)),
                };
                StepResult::success(
                    StepOutput::new()
                        .with("project_path", root.to_string_lossy().to_string())
                        .with("files", files)
                        .with("total_files", total)
                        .with("truncated", truncated)
                        .with("max_files", max_files),
                )
            }
            Err(e) => StepResult::failure(format!("Failed to collect files: {:#}", e))
                .with_metadata("error_code", "processing_error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.rs", "b.rs", "c.toml", "d.rs"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        dir
    }

    fn run(skill: &FileDataSkill, input: StepInput) -> StepResult {
        let step = ToolPlanStep {
            id: "s".into(),
            title: "collect".into(),
            description: String::new(),
            agent_type: "file_data".into(),
            input,
        };
        skill.execute_step(&step, &ExecutionContext::default())
    }

    fn skill(dir: &Path) -> FileDataSkill {
        FileDataSkill::new(
            FileAccessConfig {
                base_dir: dir.to_path_buf(),
                ..FileAccessConfig::default()
            },
            100,
        )
    }

    #[test]
    fn test_collect_respects_limit_and_order() {
        let dir = fixture();
        let options = CollectOptions {
            max_files: 2,
            extensions: vec![],
            include_content: true,
            max_file_size: 1024,
        };
        let (files, truncated) =
            collect_files(dir.path(), &options, &FileAccessConfig::default()).unwrap();
        assert!(truncated);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a.rs");
        assert_eq!(files[0].content.as_deref(), Some("a.rs"));
    }

    #[test]
    fn test_extension_filter_and_hidden_dirs() {
        let dir = fixture();
        let result = run(
            &skill(dir.path()),
            StepInput::new().with("extensions", vec!["rs"]),
        );
        assert!(result.success);
        assert_eq!(result.output.get_int("total_files"), Some(3));
        assert_eq!(result.output.get_bool("truncated"), Some(false));
        let files = result.output.get_list("files").unwrap();
        assert!(files.iter().all(|f| f["content"].is_null()));
    }

    #[test]
    fn test_max_files_from_input() {
        let dir = fixture();
        let result = run(&skill(dir.path()), StepInput::new().with("max_files", 1));
        assert_eq!(result.output.get_int("total_files"), Some(1));
        assert_eq!(result.output.get_int("max_files"), Some(1));
        assert_eq!(result.output.get_bool("truncated"), Some(true));
    }

    #[test]
    fn test_allowed_extensions_hide_other_files() {
        let dir = fixture();
        std::fs::write(dir.path().join("secret.key"), "TOPSECRET").unwrap();
        let skill = FileDataSkill::new(
            FileAccessConfig {
                base_dir: dir.path().to_path_buf(),
                allowed_extensions: vec!["rs".to_string()],
                ..FileAccessConfig::default()
            },
            100,
        );

        let result = run(&skill, StepInput::new().with("include_content", true));
        assert!(result.success);
        let files = result.output.get_list("files").unwrap();
        let paths: Vec<&str> = files.iter().filter_map(|f| f["path"].as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs", "d.rs"]);
        assert!(files.iter().all(|f| f["content"] != "TOPSECRET"));
    }

    #[test]
    fn test_validation_rejects_bad_limit() {
        let dir = fixture();
        let validation =
            skill(dir.path()).validate_input(&StepInput::new().with("max_files", "ten"));
        assert!(!validation.valid);
    }

    #[test]
    fn test_missing_project_path() {
        let dir = fixture();
        let result = run(
            &skill(dir.path()),
            StepInput::new().with("project_path", "missing"),
        );
        assert!(!result.success);
        assert_eq!(result.metadata["error_code"], "validation_failed");
    }
}
