//! # Tools
//!
//! Deterministic filesystem helpers shared by the tool agents.
//!
//! - `file_access` - Path guard, checksums and MIME detection
//! - `scanner` - Project structure scan and keyword index

pub mod file_access;
pub mod scanner;
