//! Error types for the session layer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::IncompleteReason;

/// Failure talking to the statistics process.
///
/// Any transport error is fatal for the call that hit it; the transport is
/// reset before the next call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The overall deadline of one call passed.
    #[error("timed out after {elapsed_ms} ms waiting for {waiting_for}")]
    Timeout {
        /// What the transport was waiting for.
        waiting_for: &'static str,
        /// Time spent before giving up.
        elapsed_ms: u128,
    },

    /// The process closed its output stream.
    #[error("process channel closed")]
    Closed,

    /// Output ended without the ready prompt.
    #[error("ready prompt not found in process output")]
    MissingPrompt,

    /// An I/O operation failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The pseudo-terminal could not be set up.
    #[error("pty error while {context}: {message}")]
    Pty {
        /// Operation that failed.
        context: String,
        /// Failure text reported by the pty layer.
        message: String,
    },

    /// An automation command reported a failure.
    #[error("automation command `{command}` failed: {message}")]
    Automation {
        /// Command that was issued.
        command: String,
        /// Failure text reported by the automation layer.
        message: String,
    },

    /// No session log file could be opened.
    #[error("could not open a session log in {directory} after {attempts} attempts")]
    LogUnavailable {
        /// Cache directory holding the log candidates.
        directory: PathBuf,
        /// Number of file names tried.
        attempts: u32,
    },
}

impl TransportError {
    /// Wraps an I/O error with the operation that failed.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wraps a pty-layer failure with the operation that failed.
    pub fn pty(context: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Pty {
            context: context.into(),
            message: error.to_string(),
        }
    }
}

/// Failure to line up captured output with the submitted lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A line that must echo was not found.
    #[error("echo of `{line}` not found in output")]
    EchoNotFound {
        /// Submitted line.
        line: String,
    },

    /// A direct statement matched only by the loose block heuristic.
    #[error("echo of `{line}` matched only heuristically by `{echo}`")]
    Ambiguous {
        /// Submitted line.
        line: String,
        /// Output line that matched.
        echo: String,
    },

    /// The sentinel echo never appeared.
    #[error("completion sentinel `{sentinel}` not found in output")]
    SentinelMissing {
        /// Sentinel line that was submitted.
        sentinel: String,
    },
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text did not parse.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A setting holds an unusable value.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Builds an [`ConfigError::Invalid`] value.
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Failure of one `execute` call.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The input is not a complete buffer yet.
    #[error("input is incomplete: {0:?}")]
    Incomplete(IncompleteReason),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Output could not be reconciled with the submitted lines.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Failure to bring a session up.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The process could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The initialization chunk failed.
    #[error("session initialization failed with return code {return_code}")]
    Init {
        /// Return code of the initialization chunk.
        return_code: i32,
        /// Output captured while initializing.
        output: String,
    },
}
