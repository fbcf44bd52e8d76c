//! Error types for the threat model editor

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while reading a schema document
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Schema has no section named {0}")]
    MissingSection(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a schema tree editor when an action does not fit the
/// editor it was sent to. User input never produces these; coercion and
/// silent no-ops cover that.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Path {path} is outside the editor rooted at {root}")]
    OutsideRoot { path: String, root: String },

    #[error("Path {0} is not described by the schema")]
    NotInSchema(String),

    #[error("Field {path} is a {actual}, cannot {operation}")]
    WrongKind {
        path: String,
        actual: &'static str,
        operation: &'static str,
    },

    #[error("Field {path} has unsupported type {type_name}")]
    Unsupported { path: String, type_name: String },

    #[error("{value:?} is not one of the options for {path}")]
    NotAnOption { path: String, value: String },

    #[error("Index {index} out of range for {path} (length {len})")]
    IndexOutOfRange { path: String, index: usize, len: usize },

    #[error("Parent of {0} is not a mapping or sequence")]
    NotAContainer(String),
}

/// Errors raised by the text codec at the load/export boundary
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Model root must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// Errors surfaced by a risk analysis collaborator
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis transport failed: {0}")]
    Transport(String),

    #[error("Malformed analysis response: {0}")]
    Response(#[from] serde_json::Error),
}

/// Edit session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No model loaded")]
    NoDocument,

    #[error("Failed to load model: {0}")]
    Load(#[source] CodecError),

    #[error("Failed to export model: {0}")]
    Export(#[source] CodecError),

    #[error("Edit rejected: {0}")]
    Edit(#[from] EditError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Risk analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}
