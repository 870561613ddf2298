//! Shared types for the Mender graph engine.
//!
//! This crate provides the foundational pieces used across all other Mender
//! crates:
//! - `MenderError` — unified error taxonomy
//! - `RunStatus` — terminal status of a graph run
//! - `Result` — convenience alias

use serde::{Deserialize, Serialize};

/// Unified error type for all Mender subsystems.
#[derive(Debug, thiserror::Error)]
pub enum MenderError {
    // === State merge errors ===
    #[error("no merge policy declared for field '{field}'")]
    UnknownField { field: String },

    // === Execution errors ===
    #[error("node '{node}' failed: {cause}")]
    NodeExecution {
        node: String,
        #[source]
        cause: Box<MenderError>,
    },

    #[error("routing rule for node '{node}' returned undeclared destination '{destination}'")]
    RoutingConfiguration { node: String, destination: String },

    #[error("run exceeded the absolute node execution cap of {limit}")]
    IterationLimitExceeded { limit: usize },

    #[error("run cancelled by caller")]
    Cancelled,

    // === Graph construction errors ===
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    // === Collaborator errors ===
    #[error("collaborator '{collaborator}' error: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl MenderError {
    /// Returns `true` for configuration-shape errors that should have been
    /// caught at graph-construction time rather than mid-run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MenderError::UnknownField { .. }
                | MenderError::RoutingConfiguration { .. }
                | MenderError::InvalidGraph(_)
        )
    }

    /// Returns the name of the failing node when the error originated from a
    /// node execution.
    pub fn failing_node(&self) -> Option<&str> {
        match self {
            MenderError::NodeExecution { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, MenderError>`.
pub type Result<T> = std::result::Result<T, MenderError>;

// ---------------------------------------------------------------------------
// RunStatus — terminal status of a graph run
// ---------------------------------------------------------------------------

/// How a run ended.
///
/// `Exhausted` is a *normal* outcome: the retry loop gave up within policy.
/// `Aborted` means the run crashed (node failure, cancellation, or an
/// engine-level guard); callers must not treat the two identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Exhausted,
    Aborted,
}

impl RunStatus {
    /// The lowercase wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Returns `true` when the run ended without crashing — success or a
    /// within-policy exhaustion.
    pub fn is_orderly(&self) -> bool {
        !matches!(self, RunStatus::Aborted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
