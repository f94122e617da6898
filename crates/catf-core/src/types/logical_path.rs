//! Slash-delimited path of a file inside the original artifacts.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

/// Path of a file as it exists logically inside the two compared artifacts,
/// independent of the staging directory it was extracted into.
///
/// A `LogicalPath` is always normalised: segments are separated by exactly
/// one `/`, and there is no leading or trailing separator. The root of the
/// artifacts is the empty path.
///
/// # Examples
///
/// ```
/// use catf_core::types::LogicalPath;
///
/// let path = LogicalPath::new("/IMAGES//system.img/");
/// assert_eq!(path.as_str(), "IMAGES/system.img");
///
/// let child = path.join("app/Bluetooth/Bluetooth.apk");
/// assert_eq!(child.file_name(), "Bluetooth.apk");
/// assert_eq!(child.parent(), "IMAGES/system.img/app/Bluetooth");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalPath(String);

impl LogicalPath {
    /// Creates a normalised logical path.
    #[must_use]
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize(path.as_ref()))
    }

    /// The artifact root.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Returns `true` for the artifact root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a relative path.
    #[must_use]
    pub fn join(&self, relative: impl AsRef<str>) -> Self {
        let relative = relative.as_ref();
        if self.is_root() {
            return Self::new(relative);
        }
        Self::new(format!("{}/{relative}", self.0))
    }

    /// Final segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Everything before the final segment.
    #[must_use]
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(parent, _)| parent)
    }

    /// Extension of the final segment, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        Path::new(self.file_name()).extension().and_then(|e| e.to_str())
    }

    /// Iterates over the segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Location of the rendered diff for this path under `output_root`:
    /// `output_root/<parent>/<file name>.diff`.
    #[must_use]
    pub fn diff_path(&self, output_root: &Path) -> PathBuf {
        let mut target = output_root.to_path_buf();
        for segment in self.parent().split('/').filter(|s| !s.is_empty()) {
            target.push(segment);
        }
        target.push(format!("{}.diff", self.file_name()));
        target
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(LogicalPath::new("a//b///c").as_str(), "a/b/c");
        assert_eq!(LogicalPath::new("/a/b").as_str(), "a/b");
        assert_eq!(LogicalPath::new("a/b/").as_str(), "a/b");
        assert!(LogicalPath::new("//").is_root());
    }

    #[test]
    fn test_join_on_root() {
        let root = LogicalPath::root();
        assert_eq!(root.join("SYSTEM/build.prop").as_str(), "SYSTEM/build.prop");
    }

    #[test]
    fn test_file_name_and_parent() {
        let path = LogicalPath::new("IMAGES/boot.img");
        assert_eq!(path.file_name(), "boot.img");
        assert_eq!(path.parent(), "IMAGES");
        assert_eq!(path.extension(), Some("img"));

        let single = LogicalPath::new("README");
        assert_eq!(single.file_name(), "README");
        assert_eq!(single.parent(), "");
        assert_eq!(single.extension(), None);
    }

    #[test]
    fn test_diff_path() {
        let path = LogicalPath::new("IMAGES/system.img/build.prop");
        assert_eq!(
            path.diff_path(Path::new("diffs")),
            PathBuf::from("diffs/IMAGES/system.img/build.prop.diff")
        );

        let top = LogicalPath::new("build.prop");
        assert_eq!(
            top.diff_path(Path::new("out")),
            PathBuf::from("out/build.prop.diff")
        );
    }

    #[test]
    fn test_segments() {
        let path = LogicalPath::new("a/b/c");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(LogicalPath::root().segments().count(), 0);
    }
}
