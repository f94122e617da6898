//! Error types for artifact comparison.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `CompareError`.
pub type Result<T> = std::result::Result<T, CompareError>;

/// Errors that can occur while comparing two artifacts.
#[derive(Error, Debug)]
pub enum CompareError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A top-level artifact does not exist.
    #[error("no such artifact: {path}")]
    MissingArtifact {
        /// Path that was given.
        path: PathBuf,
    },

    /// The two files of a pair carry different extensions.
    #[error("cannot compare '{first}' and '{second}' files: not the same extension")]
    MismatchedExtensions {
        /// Extension of the first file.
        first: String,
        /// Extension of the second file.
        second: String,
    },

    /// A top-level artifact is not a container that can be unpacked.
    #[error("not a comparable container: {path}")]
    NotAContainer {
        /// Path of the artifact.
        path: PathBuf,
    },

    /// An external tool exited abnormally.
    #[error("'{program}' exited with status {code}{}", format_stderr(.stderr))]
    ToolFailed {
        /// Program that was invoked.
        program: String,
        /// Exit code, or -1 when terminated by a signal.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// An external tool could not be located.
    #[error("required tool '{program}' not found")]
    ToolNotFound {
        /// Program that was looked up.
        program: String,
    },

    /// The run deadline elapsed while work was still pending.
    #[error("run deadline of {limit:?} exceeded")]
    DeadlineExceeded {
        /// Configured time limit.
        limit: Duration,
    },

    /// Nested containers went deeper than the configured limit.
    #[error("maximum nesting depth {max} exceeded at {path}")]
    DepthExceeded {
        /// Maximum permitted depth.
        max: usize,
        /// File at which the limit was hit.
        path: PathBuf,
    },

    /// A container could not be read.
    #[error("invalid archive {path}: {reason}")]
    InvalidArchive {
        /// Archive path.
        path: PathBuf,
        /// Reason reported by the reader.
        reason: String,
    },

    /// A pair failed to extract and the failure policy asked to abort.
    #[error("files could not be compared: {first} {second}: {reason}")]
    Uncomparable {
        /// First file of the pair.
        first: PathBuf,
        /// Second file of the pair.
        second: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// The output directory would overwrite something that must not be
    /// deleted.
    #[error("refusing to use {path} as the output directory")]
    UnsafeOutputDir {
        /// Offending path.
        path: PathBuf,
    },

    /// The build properties member is absent from a target archive.
    #[error("{member} not found in {path}")]
    BuildPropMissing {
        /// Archive searched.
        path: PathBuf,
        /// Member that was expected.
        member: String,
    },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl CompareError {
    /// Returns `true` if this error is an operator mistake that aborts the
    /// run before any output is produced.
    ///
    /// # Examples
    ///
    /// ```
    /// use catf_core::CompareError;
    ///
    /// let err = CompareError::MismatchedExtensions {
    ///     first: ".zip".into(),
    ///     second: ".apk".into(),
    /// };
    /// assert!(err.is_usage_error());
    /// ```
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::MissingArtifact { .. }
                | Self::MismatchedExtensions { .. }
                | Self::NotAContainer { .. }
                | Self::UnsafeOutputDir { .. }
        )
    }

    /// Returns `true` if the comparison can continue past this error by
    /// marking the affected pair as uncomparable.
    ///
    /// Usage errors and an aborted run are never recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ToolFailed { .. }
                | Self::ToolNotFound { .. }
                | Self::DeadlineExceeded { .. }
                | Self::DepthExceeded { .. }
                | Self::InvalidArchive { .. }
        )
    }

    /// Returns a context string for this error, if available.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { stderr, .. } if !stderr.trim().is_empty() => Some(stderr.trim()),
            Self::InvalidArchive { reason, .. } | Self::Uncomparable { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
