//! Comparison reporting.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::LeafDifference;
use crate::types::LogicalPath;
use crate::types::UncomparablePair;

const RULE: &str = "================";

/// Report of a comparison run.
#[derive(Debug, Clone, Default)]
pub struct ComparisonReport {
    /// Leaves with a non-empty rendered diff, in discovery order.
    pub differing: Vec<LeafDifference>,

    /// Pairs that could not be compared, including leaves whose diff could
    /// not be rendered.
    pub uncomparable: Vec<UncomparablePair>,

    /// Leaves found by the recursive comparison, before filtering.
    pub leaves_discovered: usize,

    /// Leaves suppressed as duplicates of an earlier leaf.
    pub duplicates_filtered: usize,

    /// Wall-clock duration of the comparison (excluding rendering).
    pub elapsed: Duration,

    /// Root of the rendered diff tree.
    pub output_dir: PathBuf,

    /// Location of the summary document.
    pub summary_path: PathBuf,
}

impl ComparisonReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of differing files.
    #[must_use]
    pub fn total_differing(&self) -> usize {
        self.differing.len()
    }

    /// Returns `true` if any pair could not be compared.
    #[must_use]
    pub fn has_uncomparable(&self) -> bool {
        !self.uncomparable.is_empty()
    }

    /// Differing files per extension group (`no-extension` for none).
    #[must_use]
    pub fn extension_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for leaf in &self.differing {
            *counts.entry(leaf.extension_group()).or_insert(0) += 1;
        }
        counts
    }

    /// Differing files grouped by extension.
    #[must_use]
    pub fn by_extension(&self) -> BTreeMap<String, Vec<&LeafDifference>> {
        let mut groups: BTreeMap<String, Vec<&LeafDifference>> = BTreeMap::new();
        for leaf in &self.differing {
            groups.entry(leaf.extension_group()).or_default().push(leaf);
        }
        groups
    }

    /// The few lines printed to the console at the end of a run.
    #[must_use]
    pub fn short_summary(&self) -> String {
        let counts = self
            .extension_counts()
            .iter()
            .map(|(ext, n)| format!("{ext}: {n}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Comparison completed in {:.2} seconds",
            self.elapsed.as_secs_f64()
        );
        let _ = writeln!(
            out,
            "In total there were {} files that differ",
            self.total_differing()
        );
        if !counts.is_empty() {
            let _ = writeln!(out, "By extension: {counts}");
        }
        out
    }

    /// The uncomparable pairs, one per line, or an empty string.
    #[must_use]
    pub fn uncomparable_summary(&self) -> String {
        if self.uncomparable.is_empty() {
            return String::new();
        }
        let mut out = format!(
            "{} files could not be automatically compared, these were:\n",
            self.uncomparable.len()
        );
        for pair in &self.uncomparable {
            let _ = writeln!(
                out,
                "{} {}\n\t{}",
                pair.pair.first.display(),
                pair.pair.second.display(),
                pair.reason
            );
        }
        out
    }

    /// The full summary document: one block per extension listing every
    /// differing file, then the short summary and the uncomparable pairs.
    #[must_use]
    pub fn summary_document(&self) -> String {
        let mut out = String::new();
        for (ext, leaves) in self.by_extension() {
            let _ = writeln!(out, "{RULE}");
            let _ = writeln!(out, "BEGIN {ext} files, {} found:", leaves.len());
            for leaf in leaves {
                let _ = writeln!(out, "{}", leaf.logical_path);
                let _ = writeln!(out, "\t{}", leaf.pair.first.display());
                let _ = writeln!(out, "\t{}\n", leaf.pair.second.display());
            }
            let _ = writeln!(out, "END {ext} files");
            let _ = writeln!(out, "{RULE}\n");
        }
        out.push_str("\n\n");
        out.push_str(&self.short_summary());
        out.push_str(&self.uncomparable_summary());
        out
    }
}

/// Progress notifications from a comparison run.
///
/// Sibling containers are compared in parallel, so every method takes
/// `&self` and implementations must be `Send + Sync`.
///
/// # Examples
///
/// ```
/// use catf_core::ProgressCallback;
/// use catf_core::types::LogicalPath;
/// use std::sync::atomic::AtomicUsize;
/// use std::sync::atomic::Ordering;
///
/// #[derive(Default)]
/// struct CountNodes(AtomicUsize);
///
/// impl ProgressCallback for CountNodes {
///     fn on_node_start(&self, _path: &LogicalPath, _depth: usize) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn on_node_complete(&self, _path: &LogicalPath, _leaves: usize) {}
///
///     fn on_render(&self, _path: &LogicalPath, _current: usize, _total: usize) {}
///
///     fn on_complete(&self) {}
/// }
/// ```
pub trait ProgressCallback: Send + Sync {
    /// Called before a container pair is unpacked.
    fn on_node_start(&self, path: &LogicalPath, depth: usize);

    /// Called once a container pair and everything below it is compared.
    fn on_node_complete(&self, path: &LogicalPath, leaves: usize);

    /// Called before the diff of a leaf is rendered (`current` is 1-indexed).
    fn on_render(&self, path: &LogicalPath, current: usize, total: usize);

    /// Called when the run is complete.
    fn on_complete(&self);
}

/// No-op implementation of `ProgressCallback`.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_node_start(&self, _path: &LogicalPath, _depth: usize) {}

    fn on_node_complete(&self, _path: &LogicalPath, _leaves: usize) {}

    fn on_render(&self, _path: &LogicalPath, _current: usize, _total: usize) {}

    fn on_complete(&self) {}
}
