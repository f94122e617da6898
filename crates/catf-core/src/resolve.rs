//! Mapping of on-disk staging paths back to logical paths.

use std::path::Path;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::staging::ROOT_NAMESPACE;
use crate::staging::StagingArea;
use crate::types::LogicalPath;

/// Every namespace a staging location can live in.
const NAMESPACES: &[&str] = &[
    ROOT_NAMESPACE,
    "imgs",
    "capex",
    "apex",
    "apks",
    "zip",
    "ext4",
    "gz",
    "lz4",
    "xz",
    "bz2",
    "zst",
];

/// Work directory name of the boot image editor.
const EDITOR_DIR: &str = "unzip_boot";

/// Resolves staged files to their logical path inside the artifacts.
///
/// Staging directories are registered with the logical path of the container
/// they hold. A file below a registered directory resolves to that logical
/// path plus its relative path; the longest registered prefix wins. Anything
/// else goes through a textual fallback that strips staging roots and
/// artifact names out of the path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use catf_core::resolve::PathResolver;
/// use catf_core::types::LogicalPath;
///
/// let resolver = PathResolver::with_roots("/tmp/catf", ["a.zip", "b.zip"]);
/// resolver.register("/tmp/catf/zip/x.zip/a.zip", LogicalPath::new("x.zip"));
///
/// let logical = resolver.resolve(Path::new("/tmp/catf/zip/x.zip/a.zip/etc/hosts"));
/// assert_eq!(logical.as_str(), "x.zip/etc/hosts");
/// ```
#[derive(Debug)]
pub struct PathResolver {
    registry: RwLock<Vec<(PathBuf, LogicalPath)>>,
    staging_root: PathBuf,
    names: Vec<String>,
}

impl PathResolver {
    /// Creates a resolver for a staging area.
    #[must_use]
    pub fn new(staging: &StagingArea) -> Self {
        Self::with_roots(staging.root(), staging.names())
    }

    /// Creates a resolver from a staging root and artifact names.
    #[must_use]
    pub fn with_roots<I, S>(staging_root: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            registry: RwLock::new(Vec::new()),
            staging_root: staging_root.into(),
            names: names.into_iter().map(|n| n.as_ref().to_string()).collect(),
        }
    }

    /// Registers a staging directory as holding the container at `logical`.
    pub fn register(&self, staging_dir: impl Into<PathBuf>, logical: LogicalPath) {
        let staging_dir = staging_dir.into();
        let mut registry = match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.retain(|(dir, _)| *dir != staging_dir);
        registry.push((staging_dir, logical));
    }

    /// Logical path registered for the deepest staging directory containing
    /// `path`, joined with the remainder.
    #[must_use]
    pub fn lookup(&self, path: &Path) -> Option<LogicalPath> {
        let registry = match self.registry.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry
            .iter()
            .filter(|(dir, _)| path.starts_with(dir))
            .max_by_key(|(dir, _)| dir.components().count())
            .map(|(dir, logical)| {
                let relative = path.strip_prefix(dir).unwrap_or(path);
                logical.join(relative.to_string_lossy())
            })
    }

    /// Resolves an on-disk path, falling back to textual stripping for
    /// unregistered locations.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> LogicalPath {
        self.lookup(path).unwrap_or_else(|| self.strip(path))
    }

    /// Logical path of a file discovered while comparing the container at
    /// `parent`.
    #[must_use]
    pub fn child_path(&self, parent: &LogicalPath, on_disk: &Path) -> LogicalPath {
        if let Some(logical) = self.lookup(on_disk) {
            return logical;
        }
        let file_name = on_disk
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        descend(parent, &self.strip(on_disk), &file_name)
    }

    fn strip(&self, path: &Path) -> LogicalPath {
        let mut text = path.to_string_lossy().replace('\\', "/");
        let root = self.staging_root.to_string_lossy().replace('\\', "/");
        for namespace in NAMESPACES {
            text = text.replace(&format!("{root}/{namespace}"), "");
        }
        text = text.replace(&root, "");
        for name in &self.names {
            text = text.replace(name.as_str(), "");
        }
        text = text.replace(EDITOR_DIR, "");
        LogicalPath::new(text)
    }
}

/// Splice-or-append rule for the logical path of an unregistered child.
///
/// When the parent's final segment occurs in the stripped relative name, the
/// relative name already carries the parent and replaces it; otherwise the
/// bare file name is appended to the parent.
#[must_use]
pub fn descend(parent: &LogicalPath, relative: &LogicalPath, file_name: &str) -> LogicalPath {
    let parent_file = parent.file_name();
    if !parent_file.is_empty() && relative.as_str().contains(parent_file) {
        LogicalPath::new(parent.parent()).join(relative.as_str())
    } else {
        parent.join(file_name)
    }
}
