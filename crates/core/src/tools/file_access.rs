//! # File Access Guard
//!
//! Every path a tool agent reads goes through [`resolve`]: no parent
//! traversal, nothing outside `base_dir`, nothing under a blocked prefix,
//! and only allowed extensions.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

use crate::config::FileAccessConfig;

/// A file read through the guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContents {
    pub path: PathBuf,
    pub content: String,
    pub size: u64,
    pub line_count: usize,
    pub mime_type: String,
    /// Lowercase hex SHA-256 of the raw bytes
    pub checksum: String,
}

/// Reject empty paths, NUL bytes and `..` components
pub fn sanitize_path(raw: &str) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Path is empty");
    }
    if trimmed.contains('\0') {
        bail!("Path contains a NUL byte");
    }
    let path = PathBuf::from(trimmed);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        bail!("Path traversal is not allowed: {}", trimmed);
    }
    Ok(path)
}

pub fn is_extension_allowed(config: &FileAccessConfig, path: &Path) -> bool {
    if config.allowed_extensions.is_empty() {
        return true;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    config
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn is_blocked(config: &FileAccessConfig, path: &Path) -> bool {
    config
        .blocked_paths
        .iter()
        .any(|blocked| path.starts_with(blocked))
}

/// Canonical path for `raw`, checked against every rule in `config`.
///
/// Relative paths resolve against `base_dir`.
pub fn resolve(config: &FileAccessConfig, raw: &str) -> Result<PathBuf> {
    let canonical = resolve_within_base(config, raw)?;
    if !is_extension_allowed(config, &canonical) {
        bail!("File extension not allowed: {}", raw.trim());
    }
    Ok(canonical)
}

/// Like [`resolve`] for a directory; the extension allow-list does not apply
pub fn resolve_dir(config: &FileAccessConfig, raw: &str) -> Result<PathBuf> {
    let canonical = resolve_within_base(config, raw)?;
    if !canonical.is_dir() {
        bail!("Not a directory: {}", raw.trim());
    }
    Ok(canonical)
}

fn resolve_within_base(config: &FileAccessConfig, raw: &str) -> Result<PathBuf> {
    let path = sanitize_path(raw)?;
    let base = config
        .base_dir
        .canonicalize()
        .with_context(|| format!("Base directory {:?} is not accessible", config.base_dir))?;

    let joined = if path.is_absolute() { path } else { base.join(path) };
    let canonical = joined
        .canonicalize()
        .with_context(|| format!("File not found: {}", raw.trim()))?;

    if is_blocked(config, &canonical) {
        bail!("Access to {:?} is blocked", canonical);
    }
    if !canonical.starts_with(&base) {
        bail!("Path escapes base directory: {}", raw.trim());
    }
    Ok(canonical)
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read a UTF-8 text file through the guard
pub fn read_file(config: &FileAccessConfig, raw: &str) -> Result<FileContents> {
    let path = resolve(config, raw)?;
    let meta = std::fs::metadata(&path).with_context(|| format!("Failed to stat {:?}", path))?;
    if !meta.is_file() {
        bail!("Not a regular file: {}", raw.trim());
    }
    if meta.len() > config.max_file_size as u64 {
        bail!(
            "File too large: {} bytes (limit {})",
            meta.len(),
            config.max_file_size
        );
    }

    let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
    let checksum = checksum(&bytes);
    let content =
        String::from_utf8(bytes).with_context(|| format!("{:?} is not valid UTF-8", path))?;

    Ok(FileContents {
        mime_type: mime_guess::from_path(&path)
            .first_or_text_plain()
            .essence_str()
            .to_string(),
        size: meta.len(),
        line_count: content.lines().count(),
        checksum,
        content,
        path,
    })
}
