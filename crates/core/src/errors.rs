//! Error types for the patchtester core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    P4(#[from] P4Error),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

// ---------------------------------------------------------------------------
// Perforce errors
// ---------------------------------------------------------------------------

/// Errors from `p4` CLI operations.
#[derive(Debug, Error)]
pub enum P4Error {
    /// The `p4` binary was not found on `$PATH`.
    #[error("p4 binary not found: {0}")]
    BinaryNotFound(String),

    /// A `p4` command exited non-zero or wrote to stderr.
    #[error("p4 command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Could not make sense of the tagged output produced by `p4`.
    #[error("failed to parse p4 output: {0}")]
    ParseError(String),

    /// The change acknowledgment did not read `Change <id> created`.
    #[error("unexpected change acknowledgment: {0}")]
    UnexpectedAcknowledgment(String),

    /// Generic I/O wrapper.
    #[error("p4 I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl P4Error {
    /// The raw backend text carried by this error, used as diagnostic payload.
    pub fn detail(&self) -> String {
        match self {
            Self::CommandFailed { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run-level (fatal) errors
// ---------------------------------------------------------------------------

/// Conditions that make the workspace untrustworthy and abort the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The requested client workspace does not exist.
    #[error("client \"{0}\" was not found")]
    ClientNotFound(String),

    /// The operator declined a destructive confirmation.
    #[error("operator declined: {0}")]
    Declined(String),

    /// No patch requests were found for the branch.
    #[error("no patch requests found for branch {0}")]
    NoRequestData(String),

    /// An unknown release / branch name was requested.
    #[error("branch {0} not found")]
    UnknownBranch(String),

    /// Unrecoverable backend failure during workspace preparation or cleanup.
    #[error("backend failure during {stage}: {source}")]
    Backend {
        stage: &'static str,
        #[source]
        source: P4Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Request source errors
// ---------------------------------------------------------------------------

/// Errors from the patch-request (ticket) source.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The requested ticket does not exist.
    #[error("patch request not found: {0}")]
    NotFound(String),

    /// The ticket export could not be read.
    #[error("request source error at '{path}': {detail}")]
    SourceError { path: String, detail: String },

    /// Generic I/O error.
    #[error("request source I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Errors from report delivery.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Email delivery failed.
    #[error("email notification failed: {0}")]
    EmailError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = P4Error::CommandFailed {
            exit_code: 1,
            stderr: "//depot/x - no such file(s).".into(),
        };
        assert!(err.to_string().contains("no such file"));

        let err = RunError::ClientNotFound("bob-ws".into());
        assert_eq!(err.to_string(), "client \"bob-ws\" was not found");

        let err = ConfigError::InvalidValue {
            field: "p4.port".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("p4.port"));
    }

    #[test]
    fn test_detail_prefers_stderr() {
        let err = P4Error::CommandFailed {
            exit_code: 0,
            stderr: "file(s) up-to-date.".into(),
        };
        assert_eq!(err.detail(), "file(s) up-to-date.");

        let err = P4Error::BinaryNotFound("p4".into());
        assert_eq!(err.detail(), "p4 binary not found: p4");
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = P4Error::ParseError("x".into()).into();
        assert!(matches!(core_err, CoreError::P4(_)));

        let core_err: CoreError = RunError::NoRequestData("1.0".into()).into();
        assert!(matches!(core_err, CoreError::Run(_)));
    }
}
