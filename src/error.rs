//! Error types for Docki

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing values in docki.yaml: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Resource not found: {0}")]
    MissingResource(String),

    #[error("`{command}` failed:\n{output}")]
    EngineInvocation { command: String, output: String },

    #[error("Container '{0}' is already running. Use `docki stop` to remove it first")]
    NameConflict(String),

    #[error("`{command}` failed: {reason}")]
    HostCommand { command: String, reason: String },

    #[error("Multiplexer error: {0}")]
    Multiplexer(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DockiError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DockiError::Interrupted => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DockiError>;
