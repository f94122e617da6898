//! High-level public API for comparing two artifacts.

use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use crate::CompareConfig;
use crate::CompareError;
use crate::Result;
use crate::compare::Comparator;
use crate::deadline::Deadline;
use crate::dedup::filter_duplicates;
use crate::render::DiffTreeBuilder;
use crate::report::ComparisonReport;
use crate::report::NoopProgress;
use crate::report::ProgressCallback;
use crate::resolve::PathResolver;
use crate::staging::StagingArea;
use crate::tools::DiffBackend;
use crate::tools::FormatHandler;
use crate::tools::SystemTools;
use crate::types::ArtifactPair;

/// Compares two artifacts with the system tool backend.
///
/// Both artifacts are unpacked recursively, every differing file is rendered
/// below `config.output_dir`, and a summary document is written to
/// `config.summary_path()`.
///
/// # Errors
///
/// Returns an error if:
/// - An artifact is missing, the extensions differ, or the artifacts are not
///   containers
/// - The output directory is unsafe to replace
/// - The artifacts themselves cannot be unpacked
/// - A nested pair fails under [`FailurePolicy::Abort`](crate::FailurePolicy)
/// - The diff tree or summary cannot be written
///
/// # Examples
///
/// ```no_run
/// use catf_core::CompareConfig;
/// use catf_core::compare_artifacts;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CompareConfig::default().with_output_dir("diffs");
/// let report = compare_artifacts("old/target_files.zip", "new/target_files.zip", &config)?;
/// print!("{}", report.short_summary());
/// # Ok(())
/// # }
/// ```
pub fn compare_artifacts<P: AsRef<Path>, Q: AsRef<Path>>(
    first: P,
    second: Q,
    config: &CompareConfig,
) -> Result<ComparisonReport> {
    let tools = SystemTools::new(&config.image_tool).with_deadline(Deadline::start(config.deadline));
    compare_artifacts_with(first, second, config, &tools, &tools, &NoopProgress)
}

/// Compares two artifacts with caller-provided capabilities and progress
/// reporting.
///
/// # Errors
///
/// See [`compare_artifacts`].
pub fn compare_artifacts_with<P: AsRef<Path>, Q: AsRef<Path>>(
    first: P,
    second: Q,
    config: &CompareConfig,
    handler: &dyn FormatHandler,
    backend: &dyn DiffBackend,
    progress: &dyn ProgressCallback,
) -> Result<ComparisonReport> {
    let deadline = Deadline::start(config.deadline);
    let artifacts = ArtifactPair::new(first.as_ref(), second.as_ref())?;
    ensure_safe_output(&config.output_dir, &config.staging_dir)?;

    let staging = StagingArea::new(&config.staging_dir, &artifacts, config.force_clean);
    staging.prepare()?;
    let resolver = PathResolver::new(&staging);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(io::Error::other)?;

    info!(
        first = %artifacts.first.path.display(),
        second = %artifacts.second.path.display(),
        "starting comparison"
    );
    let comparator = Comparator::new(
        config, handler, backend, &staging, &resolver, deadline, progress,
    );
    let outcome = pool.install(|| comparator.compare_root(&artifacts))?;
    let elapsed = deadline.elapsed();

    let leaves_discovered = outcome.leaves.len();
    let leaves = if config.filter_duplicates {
        filter_duplicates(outcome.leaves)
    } else {
        outcome.leaves
    };
    let duplicates_filtered = leaves_discovered - leaves.len();

    replace_dir(&config.output_dir)?;
    let builder = DiffTreeBuilder::new(config, backend, &staging, &outcome.bundles, progress)?;
    let rendered = pool.install(|| builder.render(leaves, &config.output_dir));
    rendered.write_tree()?;

    let mut uncomparable = outcome.uncomparable;
    uncomparable.extend(rendered.failed);
    let report = ComparisonReport {
        differing: rendered.rendered.into_iter().map(|diff| diff.leaf).collect(),
        uncomparable,
        leaves_discovered,
        duplicates_filtered,
        elapsed,
        output_dir: config.output_dir.clone(),
        summary_path: config.summary_path(),
    };

    if let Some(parent) = report.summary_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&report.summary_path, report.summary_document())?;

    info!(
        differing = report.total_differing(),
        uncomparable = report.uncomparable.len(),
        "comparison complete"
    );
    progress.on_complete();
    Ok(report)
}

/// Refuses output directories whose removal would destroy something else:
/// the filesystem root, the working directory or one of its ancestors, the
/// home directory, or anything containing the staging area.
fn ensure_safe_output(output: &Path, staging: &Path) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let output_abs = absolute(&cwd, output);
    let staging_abs = absolute(&cwd, staging);

    let unsafe_dir = output_abs.parent().is_none()
        || cwd.starts_with(&output_abs)
        || dirs::home_dir().is_some_and(|home| home == output_abs)
        || staging_abs.starts_with(&output_abs);
    if unsafe_dir {
        return Err(CompareError::UnsafeOutputDir {
            path: output.to_path_buf(),
        });
    }
    Ok(())
}

/// Lexically absolute form of `path`.
fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn replace_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absolute_normalizes() {
        let cwd = Path::new("/work/tree");
        assert_eq!(absolute(cwd, Path::new("diffs")), PathBuf::from("/work/tree/diffs"));
        assert_eq!(absolute(cwd, Path::new("./a/../b")), PathBuf::from("/work/tree/b"));
        assert_eq!(absolute(cwd, Path::new("/abs")), PathBuf::from("/abs"));
    }

    #[test]
    fn test_unsafe_output_dirs_rejected() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        for bad in [Path::new("/"), Path::new("."), Path::new("..")] {
            let err = ensure_safe_output(bad, &staging).unwrap_err();
            assert!(matches!(err, CompareError::UnsafeOutputDir { .. }));
            assert!(err.is_usage_error());
        }
        assert!(ensure_safe_output(temp.path(), &staging).is_err());
    }

    #[test]
    fn test_safe_output_dir_accepted() {
        let temp = TempDir::new().unwrap();
        assert!(ensure_safe_output(&temp.path().join("diffs"), &temp.path().join("staging")).is_ok());
    }

    #[test]
    fn test_replace_dir_empties_existing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("diffs");
        fs::create_dir_all(dir.join("old")).unwrap();
        replace_dir(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("old").exists());
    }
}
