//! # Scanner - Project Structure and Keyword Index
//!
//! Gitignore-aware walks used by the project scanner and the embedding
//! index skill. Both run synchronously; async callers go through
//! `spawn_blocking`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::config::FileAccessConfig;
use crate::tools::file_access;

/// Files larger than this are skipped by the keyword index
const MAX_INDEXED_FILE_BYTES: u64 = 1024 * 1024;

/// Detected project kind, from marker files in the root
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Rust,
    Typescript,
    Javascript,
    Python,
    Jvm,
    Go,
    Mixed,
    Unknown,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Rust => "rust",
            ProjectType::Typescript => "typescript",
            ProjectType::Javascript => "javascript",
            ProjectType::Python => "python",
            ProjectType::Jvm => "jvm",
            ProjectType::Go => "go",
            ProjectType::Mixed => "mixed",
            ProjectType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn detect_project_type(root: &Path) -> ProjectType {
    let has = |name: &str| root.join(name).exists();

    let mut found = Vec::new();
    if has("Cargo.toml") {
        found.push(ProjectType::Rust);
    }
    if has("package.json") {
        found.push(if has("tsconfig.json") {
            ProjectType::Typescript
        } else {
            ProjectType::Javascript
        });
    }
    if has("pyproject.toml") || has("setup.py") || has("requirements.txt") {
        found.push(ProjectType::Python);
    }
    if has("build.gradle") || has("build.gradle.kts") || has("pom.xml") {
        found.push(ProjectType::Jvm);
    }
    if has("go.mod") {
        found.push(ProjectType::Go);
    }

    match found.as_slice() {
        [] => ProjectType::Unknown,
        [single] => *single,
        _ => ProjectType::Mixed,
    }
}

/// Result of a structure scan; paths are relative to `root` and sorted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectScan {
    pub root: PathBuf,
    pub files: Vec<String>,
    pub directories: Vec<String>,
    pub project_type: ProjectType,
    /// Files seen, including those past `max_files`
    pub total_files: usize,
    pub truncated: bool,
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Walk `root` honoring `.gitignore`, keeping at most `max_files` file paths
pub fn scan_project(root: &Path, max_files: usize) -> Result<ProjectScan> {
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {:?}", root);
    }

    let mut files = Vec::new();
    let mut directories = BTreeSet::new();
    let mut total_files = 0;

    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
        let path = entry.path();
        if path == root {
            continue;
        }
        match entry.file_type() {
            Some(ft) if ft.is_dir() => {
                directories.insert(relative(root, path));
            }
            Some(ft) if ft.is_file() => {
                total_files += 1;
                if files.len() < max_files {
                    files.push(relative(root, path));
                }
            }
            _ => {}
        }
    }

    files.sort();
    Ok(ProjectScan {
        root: root.to_path_buf(),
        files,
        directories: directories.into_iter().collect(),
        project_type: detect_project_type(root),
        truncated: total_files > max_files,
        total_files,
    })
}

/// Lowercased identifier-like tokens of at least three characters
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 3)
        .filter(|t| t.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
        .map(str::to_lowercase)
}

/// Inverted keyword index: term → file → occurrences
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeywordIndex {
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub by_term: HashMap<String, BTreeMap<usize, usize>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, path: PathBuf, content: &str) {
        let doc = self.files.len();
        self.files.push(path);
        for term in tokenize(content) {
            *self.by_term.entry(term).or_default().entry(doc).or_default() += 1;
        }
    }

    pub fn document_count(&self) -> usize {
        self.files.len()
    }

    pub fn unique_terms(&self) -> usize {
        self.by_term.len()
    }

    /// Most frequent terms across all documents, ties broken alphabetically
    pub fn top_terms(&self, limit: usize) -> Vec<(String, usize)> {
        let mut terms: Vec<(String, usize)> = self
            .by_term
            .iter()
            .map(|(term, docs)| (term.clone(), docs.values().sum()))
            .collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(limit);
        terms
    }

    /// Files containing any query term, best match first
    pub fn search(&self, query: &str) -> Vec<(&Path, usize)> {
        let mut scores: BTreeMap<usize, usize> = BTreeMap::new();
        for term in tokenize(query) {
            if let Some(docs) = self.by_term.get(&term) {
                for (doc, count) in docs {
                    *scores.entry(*doc).or_default() += count;
                }
            }
        }
        let mut hits: Vec<(&Path, usize)> = scores
            .into_iter()
            .map(|(doc, score)| (self.files[doc].as_path(), score))
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hits
    }
}

/// Index up to `max_files` text files under `root`.
///
/// Unreadable, non-UTF-8 and oversized files are skipped, as are files the
/// access allow-list refuses. An empty `extensions` list indexes every
/// remaining file.
pub fn build_keyword_index(
    root: &Path,
    max_files: usize,
    extensions: &[String],
    access: &FileAccessConfig,
) -> Result<KeywordIndex> {
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {:?}", root);
    }

    let mut index = KeywordIndex::new();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        if index.document_count() >= max_files {
            break;
        }
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if !file_access::is_extension_allowed(access, path) {
            continue;
        }
        if !extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if !extensions.iter().any(|x| x.trim_start_matches('.') == ext) {
                continue;
            }
        }
        if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_INDEXED_FILE_BYTES {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => index.add_document(PathBuf::from(relative(root, path)), &content),
            Err(e) => tracing::debug!(path = ?path, error = %e, "Skipping unreadable file"),
        }
    }

    Ok(index)
}
