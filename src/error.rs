//! Error types for todo
//!
//! Every failure maps to a single exit code: the CLI either succeeds (0)
//! or reports one human-readable error and exits with 1.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the todo CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

/// A todo offered back to the user when a text reference is ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TextCandidate {
    pub position: String,
    pub text: String,
}

/// Main error type for todo operations
#[derive(Error, Debug)]
pub enum Error {
    // Reference resolution
    #[error("No todo matches '{0}'")]
    RefNotFound(String),

    #[error("Ambiguous id '{reference}' matches: {}", .candidates.join(", "))]
    AmbiguousShortId {
        reference: String,
        candidates: Vec<String>,
    },

    #[error("Ambiguous reference '{reference}' matches: {}", format_candidates(.candidates))]
    AmbiguousText {
        reference: String,
        candidates: Vec<TextCandidate>,
    },

    #[error("Malformed position path: '{0}'")]
    MalformedPath(String),

    // Mutation
    #[error("Moving {todo} under {parent} would create a cycle")]
    CycleWouldResult { todo: String, parent: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    // Storage
    #[error("Corrupt store {}: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock acquisition failed: {}", .0.display())]
    LockFailed(PathBuf),

    // Ambient
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Editor error: {0}")]
    Editor(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_candidates(candidates: &[TextCandidate]) -> String {
    candidates
        .iter()
        .map(|candidate| format!("{} \"{}\"", candidate.position, candidate.text))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        exit_codes::FAILURE
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::RefNotFound(_) => "ref_not_found",
            Error::AmbiguousShortId { .. } => "ambiguous_short_id",
            Error::AmbiguousText { .. } => "ambiguous_text",
            Error::MalformedPath(_) => "malformed_path",
            Error::CycleWouldResult { .. } => "cycle_would_result",
            Error::Validation(_) => "validation_error",
            Error::CorruptStore { .. } => "corrupt_store",
            Error::Io(_) | Error::LockFailed(_) => "io_error",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Editor(_) => "editor_error",
            Error::Json(_) | Error::Yaml(_) => "encoding_error",
        }
    }

    /// Structured payload for machine-readable error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::AmbiguousShortId { candidates, .. } => {
                Some(serde_json::json!({ "candidates": candidates }))
            }
            Error::AmbiguousText { candidates, .. } => {
                Some(serde_json::json!({ "candidates": candidates }))
            }
            Error::CycleWouldResult { todo, parent } => {
                Some(serde_json::json!({ "todo": todo, "parent": parent }))
            }
            Error::CorruptStore { path, .. } | Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path }))
            }
            _ => None,
        }
    }
}

/// Result type alias for todo operations
pub type Result<T> = std::result::Result<T, Error>;
