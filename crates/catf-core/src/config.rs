//! Configuration for an artifact comparison run.

use std::path::PathBuf;
use std::time::Duration;

/// What to do when a pair cannot be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the pair as uncomparable and keep comparing everything else.
    #[default]
    Continue,
    /// Stop the whole run on the first extraction failure.
    Abort,
}

/// Routing of `.img` files to an unpack variant, by file name.
///
/// Names not listed in any of the lists are handed to the external image
/// editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRules {
    /// Images that are never compared (they legitimately differ or are absent).
    pub skipped: Vec<String>,

    /// Sparse images: converted to raw and then extracted with the archive
    /// tool.
    pub sparse: Vec<String>,

    /// Raw images extracted directly with the archive tool.
    pub raw: Vec<String>,
}

impl Default for ImageRules {
    /// Default values:
    /// - `skipped`: `["userdata.img"]`
    /// - `sparse`: `["system.img", "product.img"]`
    /// - `raw`: `["ramdisk.img"]`
    fn default() -> Self {
        Self {
            skipped: vec!["userdata.img".to_string()],
            sparse: vec!["system.img".to_string(), "product.img".to_string()],
            raw: vec!["ramdisk.img".to_string()],
        }
    }
}

/// Configuration for a comparison run.
///
/// # Examples
///
/// ```
/// use catf_core::CompareConfig;
/// use catf_core::FailurePolicy;
///
/// let config = CompareConfig::default()
///     .with_output_dir("out/diffs")
///     .with_force_clean(true)
///     .with_failure_policy(FailurePolicy::Abort);
/// assert!(config.force_clean);
/// ```
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// Directory receiving the rendered diff tree.
    ///
    /// Default: `diffs`.
    pub output_dir: PathBuf,

    /// Root under which every staging location is created.
    ///
    /// Default: `<system temp dir>/catf`.
    pub staging_dir: PathBuf,

    /// Where the summary document is written. `None` places `summary.txt`
    /// inside `output_dir`.
    pub summary_path: Option<PathBuf>,

    /// Discard any previously extracted staging locations before starting.
    ///
    /// Default: `false` (completed extractions are reused).
    pub force_clean: bool,

    /// Suppress later leaves whose files are byte-identical to an earlier one.
    ///
    /// Default: `true`.
    pub filter_duplicates: bool,

    /// Installation directory of the boot image editor (`gradlew` lives here).
    ///
    /// Default: `~/gradlew`.
    pub image_tool: PathBuf,

    /// Behaviour on extraction failure.
    pub failure_policy: FailurePolicy,

    /// Number of worker threads comparing sibling containers. `0` picks the
    /// number of available CPUs.
    pub jobs: usize,

    /// Overall time limit for the comparison. `None` means no limit.
    pub deadline: Option<Duration>,

    /// Maximum container nesting depth.
    ///
    /// Default: `16`.
    pub max_depth: usize,

    /// How `.img` files are unpacked.
    pub image_rules: ImageRules,

    /// Extensions of line-oriented map files that are sorted before diffing.
    ///
    /// Default: `["map"]`.
    pub sorted_extensions: Vec<String>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("diffs"),
            staging_dir: std::env::temp_dir().join("catf"),
            summary_path: None,
            force_clean: false,
            filter_duplicates: true,
            image_tool: default_image_tool(),
            failure_policy: FailurePolicy::Continue,
            jobs: 0,
            deadline: None,
            max_depth: 16,
            image_rules: ImageRules::default(),
            sorted_extensions: vec!["map".to_string()],
        }
    }
}

fn default_image_tool() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from("gradlew"), |home| home.join("gradlew"))
}

impl CompareConfig {
    /// Creates a new `CompareConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the staging root.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Sets an explicit summary document path.
    #[must_use]
    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = Some(path.into());
        self
    }

    /// Sets whether staging locations are wiped before the run.
    #[must_use]
    pub fn with_force_clean(mut self, force_clean: bool) -> Self {
        self.force_clean = force_clean;
        self
    }

    /// Sets whether duplicate leaves are filtered.
    #[must_use]
    pub fn with_filter_duplicates(mut self, filter: bool) -> Self {
        self.filter_duplicates = filter;
        self
    }

    /// Sets the image editor installation directory.
    #[must_use]
    pub fn with_image_tool(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_tool = dir.into();
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Sets the overall time limit.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the image routing rules.
    #[must_use]
    pub fn with_image_rules(mut self, rules: ImageRules) -> Self {
        self.image_rules = rules;
        self
    }

    /// Resolved location of the summary document.
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.summary_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("summary.txt"))
    }

    /// Returns `true` if files with this extension are sorted before diffing.
    #[must_use]
    pub fn is_sorted_extension(&self, extension: &str) -> bool {
        self.sorted_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompareConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("diffs"));
        assert!(config.filter_duplicates);
        assert!(!config.force_clean);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.max_depth, 16);
        assert!(config.image_tool.ends_with("gradlew"));
    }

    #[test]
    fn test_summary_path_defaults_into_output_dir() {
        let config = CompareConfig::default().with_output_dir("/tmp/out");
        assert_eq!(config.summary_path(), PathBuf::from("/tmp/out/summary.txt"));

        let config = config.with_summary_path("/tmp/summary.txt");
        assert_eq!(config.summary_path(), PathBuf::from("/tmp/summary.txt"));
    }

    #[test]
    fn test_sorted_extension_case_insensitive() {
        let config = CompareConfig::default();
        assert!(config.is_sorted_extension("map"));
        assert!(config.is_sorted_extension("MAP"));
        assert!(!config.is_sorted_extension("txt"));
    }

    #[test]
    fn test_default_image_rules() {
        let rules = ImageRules::default();
        assert!(rules.skipped.contains(&"userdata.img".to_string()));
        assert!(rules.sparse.contains(&"system.img".to_string()));
        assert!(rules.raw.contains(&"ramdisk.img".to_string()));
    }
}
