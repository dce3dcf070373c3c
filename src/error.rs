//! Error taxonomy for the build engine.
//!
//! Leaf errors are a `thiserror` enum; orchestration code (the
//! environment, the CLI) wraps these in `anyhow::Result` and adds
//! context, matching the split the teacher uses between `ConfigError`
//! and `anyhow` everywhere else.

use std::path::PathBuf;
use thiserror::Error;

/// The error taxonomy from the spec's error handling design.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("missing input `{0}`")]
    MissingInput(PathBuf),

    #[error("could not find dependency `{0}` referenced from `{1}`")]
    MissingDependency(String, PathBuf),

    #[error("tool `{0}` is not available")]
    ToolUnavailable(String),

    #[error("`{tool}` failed with {status}")]
    BuildFailure {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("no builder available for {0}")]
    NoBuilder(String),

    #[error("build cancelled")]
    Cancelled,

    #[error("two builders would write the same output `{0}`")]
    DuplicateOutput(PathBuf),
}

impl BuildError {
    /// Whether this error kind is recoverable by the registry trying the
    /// next candidate builder class (spec §7: "Only `ToolUnavailable` is
    /// recoverable at registry resolution time").
    pub fn is_registry_recoverable(&self) -> bool {
        matches!(self, BuildError::ToolUnavailable(_))
    }

    /// Full diagnostic including captured stderr, for the user-visible
    /// failure report (spec §7: "a rendered textual report listing the
    /// first failing builder's parameters and diagnostic").
    pub fn full_message(&self) -> String {
        match self {
            BuildError::BuildFailure { tool, status, stderr } if !stderr.trim().is_empty() => {
                format!("`{tool}` failed with {status}:\n{}", stderr.trim())
            }
            other => other.to_string(),
        }
    }
}
