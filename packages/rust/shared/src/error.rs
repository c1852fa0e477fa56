//! Error types for sieve.
//!
//! Library crates use [`SieveError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-item fetch and translation failures are *not* errors: they degrade to
//! sentinel strings inside the adapters. Only structural failures (bad stage
//! graph, unreadable input, a stage that cannot produce output) surface here.

use std::path::PathBuf;

/// Top-level error type for all sieve operations.
#[derive(Debug, thiserror::Error)]
pub enum SieveError {
    /// Configuration loading or validation error (including an invalid stage graph).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error that cannot be degraded to a sentinel (e.g. client construction).
    #[error("network error: {0}")]
    Network(String),

    /// Input parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (record missing a required field, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Translation service error for a single request.
    #[error("translation error: {0}")]
    Translation(String),

    /// A pipeline stage failed to produce its output.
    #[error("stage {stage_id} ({stage}) failed: {source}")]
    Stage {
        stage_id: u32,
        stage: String,
        #[source]
        source: Box<SieveError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SieveError>;

impl SieveError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attribute an error to the pipeline stage that produced it.
    pub fn in_stage(self, stage_id: u32, stage: impl Into<String>) -> Self {
        Self::Stage {
            stage_id,
            stage: stage.into(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SieveError::config("stage 3 references unknown predecessor 7");
        assert_eq!(
            err.to_string(),
            "config error: stage 3 references unknown predecessor 7"
        );

        let err = SieveError::validation("record has no occurrence count");
        assert!(err.to_string().contains("no occurrence count"));
    }

    #[test]
    fn stage_error_keeps_cause() {
        let err = SieveError::validation("missing url").in_stage(5, "deduplicate-by-domain");
        assert_eq!(
            err.to_string(),
            "stage 5 (deduplicate-by-domain) failed: validation error: missing url"
        );

        let source = std::error::Error::source(&err).expect("has source");
        assert!(source.to_string().contains("missing url"));
    }
}
