//! Error conversion utilities for CLI.
//!
//! Converts catf-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use catf_core::CompareError;

/// Converts `CompareError` to user-friendly anyhow error with context
pub fn convert_compare_error(err: CompareError) -> anyhow::Error {
    match err {
        CompareError::MissingArtifact { path } => {
            anyhow!(
                "Artifact not found: {}\n\
                 HINT: Pass the paths of two existing target-files archives.",
                path.display()
            )
        }
        CompareError::MismatchedExtensions { first, second } => {
            anyhow!(
                "Cannot compare '{first}' with '{second}' files\n\
                 HINT: Both artifacts must be the same kind of file."
            )
        }
        CompareError::NotAContainer { path } => {
            anyhow!(
                "'{}' is not a container catf can unpack\n\
                 HINT: Compare plain files with diff; catf expects archives such as target_files.zip.",
                path.display()
            )
        }
        CompareError::ToolNotFound { program } if program.ends_with("gradlew") => {
            anyhow!(
                "Image editor not found: {program}\n\
                 HINT: Use --image-tool to point at the directory containing gradlew."
            )
        }
        CompareError::ToolNotFound { program } => {
            anyhow!(
                "Required tool '{program}' not found\n\
                 HINT: Install it and make sure it is on PATH."
            )
        }
        CompareError::UnsafeOutputDir { path } => {
            anyhow!(
                "Refusing to replace '{}' with the diff tree\n\
                 HINT: Choose a dedicated directory with --output.",
                path.display()
            )
        }
        CompareError::DeadlineExceeded { limit } => {
            anyhow!(
                "Comparison did not finish within {}s\n\
                 HINT: Raise --timeout or omit it.",
                limit.as_secs()
            )
        }
        CompareError::Uncomparable {
            first,
            second,
            reason,
        } => {
            anyhow!(
                "Could not compare {} and {}: {reason}\n\
                 HINT: Drop --abort-on-failure to record the pair and keep going.",
                first.display(),
                second.display()
            )
        }
        CompareError::BuildPropMissing { path, member } => {
            anyhow!(
                "{member} not found in '{}'\n\
                 HINT: Only target-files archives carry build properties.",
                path.display()
            )
        }
        CompareError::InvalidArchive { path, reason } => {
            anyhow!(
                "Invalid archive '{}': {reason}\n\
                 HINT: The archive may be corrupted or truncated.",
                path.display()
            )
        }
        _ => anyhow::Error::from(err).context("comparison failed"),
    }
}

/// Converts the error side of a core result.
pub fn add_compare_context<T>(result: catf_core::Result<T>) -> anyhow::Result<T> {
    result.map_err(convert_compare_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_convert_mismatched_extensions() {
        let err = CompareError::MismatchedExtensions {
            first: ".zip".into(),
            second: ".apk".into(),
        };
        let msg = format!("{:?}", convert_compare_error(err));
        assert!(msg.contains("'.zip' with '.apk'"));
        assert!(msg.contains("HINT"));
    }

    #[test]
    fn test_convert_missing_image_editor() {
        let err = CompareError::ToolNotFound {
            program: "/home/me/gradlew/gradlew".into(),
        };
        let msg = format!("{:?}", convert_compare_error(err));
        assert!(msg.contains("--image-tool"));
    }

    #[test]
    fn test_convert_deadline() {
        let err = CompareError::DeadlineExceeded {
            limit: Duration::from_secs(90),
        };
        let msg = format!("{:?}", convert_compare_error(err));
        assert!(msg.contains("90s"));
        assert!(msg.contains("--timeout"));
    }

    #[test]
    fn test_convert_unsafe_output() {
        let err = CompareError::UnsafeOutputDir {
            path: PathBuf::from("/"),
        };
        let msg = format!("{:?}", convert_compare_error(err));
        assert!(msg.contains("--output"));
    }

    #[test]
    fn test_convert_io_error() {
        let err = CompareError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let msg = format!("{:?}", convert_compare_error(err));
        assert!(msg.contains("comparison failed"));
        assert!(msg.contains("gone"));
    }
}
