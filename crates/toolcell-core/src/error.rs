//! Pipeline error taxonomy.
//!
//! Every pipeline step returns an explicit error variant; the orchestrator
//! threads them with `?` and converts the final error into an
//! [`crate::envelope::ExecutionEnvelope`]. Warnings are accumulated
//! separately and never promoted to errors.

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Tool name absent from the catalog store.
    #[error("Tool '{0}' not found in catalog")]
    ToolUnknown(String),

    /// The catalog store could not be opened or queried. Surfaced, not retried.
    #[error("Catalog store unavailable: {0}")]
    StoreUnavailable(String),

    /// Input validation failed; carries the per-field error list.
    #[error("Input validation failed: {}", .errors.join("; "))]
    InvalidInput { errors: Vec<String> },

    /// Runtime creation or verification failed.
    #[error("Sandbox creation failed: {0}")]
    SandboxFailure(String),

    /// Base-class staging failed.
    #[error("Scaffold setup failed: {0}")]
    ScaffoldFailure(String),

    /// Artifact absent from the remote repository; carries name suggestions.
    #[error("Tool artifact '{tool_name}' not found in repository")]
    NotFound {
        tool_name: String,
        suggestions: Vec<String>,
    },

    /// Artifact retrieval failed for transport or repository reasons.
    #[error("Tool download failed: {0}")]
    FetchFailed(String),

    /// Every requested package failed to install.
    #[error("All dependency installations failed: {}", .failed.join(", "))]
    InstallFailed {
        failed: Vec<String>,
        errors: Vec<String>,
    },

    /// Launcher exited nonzero or timed out.
    #[error("Tool execution failed: {message}")]
    ExecutionFailed {
        message: String,
        stdout: String,
        stderr: String,
    },

    /// No JSON document could be parsed from the child's stdout.
    #[error("Tool output is not valid JSON: {message}")]
    InvalidOutput {
        message: String,
        stdout: String,
        stderr: String,
    },

    /// Anything else; carries the underlying error chain as text.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExecuteError {
    /// Stable kind tag, propagated verbatim in envelope details.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolUnknown(_) => "ToolUnknown",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::SandboxFailure(_) => "SandboxFailure",
            Self::ScaffoldFailure(_) => "ScaffoldFailure",
            Self::NotFound { .. } => "NotFound",
            Self::FetchFailed(_) => "FetchFailed",
            Self::InstallFailed { .. } => "InstallFailed",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::InvalidOutput { .. } => "InvalidOutput",
            Self::Internal(_) => "Internal",
        }
    }

    /// Kind-specific payload for the envelope's `details` object.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::InvalidInput { errors } => json!({ "validation_errors": errors }),
            Self::NotFound { suggestions, .. } => json!({ "suggestions": suggestions }),
            Self::InstallFailed { failed, errors } => json!({
                "failed_packages": failed,
                "errors": errors,
            }),
            Self::ExecutionFailed { stdout, stderr, .. }
            | Self::InvalidOutput { stdout, stderr, .. } => json!({
                "stdout": stdout,
                "stderr": stderr,
            }),
            _ => json!({}),
        }
    }
}

impl From<anyhow::Error> for ExecuteError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}
