//! Request type → legacy subtype table.
//!
//! Legacy tool agents branch on a short `request_subtype` rather than the
//! full message type; the adapter injects it into the step input.

use super::message::message_types::*;

/// `(message type, subtype)` pairs understood by the bundled tool agents
pub const SUBTYPES: &[(&str, &str)] = &[
    (CODE_GENERATION_REQUEST, "code"),
    (CLASS_GENERATION_REQUEST, "class"),
    (FUNCTION_GENERATION_REQUEST, "function"),
    (ALGORITHM_GENERATION_REQUEST, "algorithm"),
    (EMBEDDING_INDEX_REQUEST, "index"),
    (OPEN_FILE_REQUEST, "open"),
    (FILE_DATA_REQUEST, "collect"),
    (PROJECT_STRUCTURE_REQUEST, "scan"),
];

pub fn subtype_for(message_type: &str) -> Option<&'static str> {
    SUBTYPES
        .iter()
        .find(|(t, _)| *t == message_type)
        .map(|(_, s)| *s)
}

/// Inverse lookup, used by the CLI to accept short names
pub fn message_type_for(subtype: &str) -> Option<&'static str> {
    SUBTYPES
        .iter()
        .find(|(_, s)| *s == subtype)
        .map(|(t, _)| *t)
}
