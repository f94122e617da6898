//! File pairs, comparison nodes and their results.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::CompareError;
use crate::Result;
use crate::formats::FormatTag;
use crate::types::LogicalPath;

/// One of the two top-level artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location on disk.
    pub path: PathBuf,
    /// Identifying name used to namespace staging directories.
    pub name: String,
}

/// The two top-level artifacts being compared. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    /// Baseline artifact.
    pub first: Artifact,
    /// Artifact compared against the baseline.
    pub second: Artifact,
}

impl ArtifactPair {
    /// Validates two artifact paths and derives their identifying names.
    ///
    /// Names are the artifacts' file names; when both are equal they are
    /// prefixed with `1-` and `2-` so staging directories never collide.
    ///
    /// # Errors
    ///
    /// Returns a usage error if either artifact is missing or the two
    /// extensions differ.
    pub fn new(first: &Path, second: &Path) -> Result<Self> {
        for path in [first, second] {
            if !path.is_file() {
                return Err(CompareError::MissingArtifact {
                    path: path.to_path_buf(),
                });
            }
        }
        check_same_extension(first, second)?;

        let mut name1 = file_name(first);
        let mut name2 = file_name(second);
        if name1 == name2 {
            name1 = format!("1-{name1}");
            name2 = format!("2-{name2}");
        }

        Ok(Self {
            first: Artifact {
                path: first.to_path_buf(),
                name: name1,
            },
            second: Artifact {
                path: second.to_path_buf(),
                name: name2,
            },
        })
    }

    /// The top-level artifacts as a file pair.
    #[must_use]
    pub fn files(&self) -> FilePair {
        FilePair::new(&self.first.path, &self.second.path)
    }

    /// Identifying names, first then second.
    #[must_use]
    pub fn names(&self) -> [&str; 2] {
        [&self.first.name, &self.second.name]
    }
}

/// Two corresponding files, one per artifact side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilePair {
    /// File on the first side.
    pub first: PathBuf,
    /// File on the second side.
    pub second: PathBuf,
}

impl FilePair {
    /// Creates a new pair.
    #[must_use]
    pub fn new(first: impl Into<PathBuf>, second: impl Into<PathBuf>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Returns `true` when both sides are regular files. Symlinks are not
    /// followed.
    #[must_use]
    pub fn both_regular_files(&self) -> bool {
        is_regular_file(&self.first) && is_regular_file(&self.second)
    }

    /// File name of the first side.
    #[must_use]
    pub fn file_name(&self) -> String {
        file_name(&self.first)
    }
}

/// The unit of recursive work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonNode {
    /// The two files being compared.
    pub pair: FilePair,
    /// Logical path of the pair; children of a container resolve beneath it.
    pub logical_path: LogicalPath,
    /// Format shared by both files.
    pub format: FormatTag,
    /// Nesting depth, zero for the top-level artifacts.
    pub depth: usize,
}

/// A differing pair that is not decomposed any further.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeafDifference {
    /// Path inside the original artifacts.
    pub logical_path: LogicalPath,
    /// Files on disk.
    pub pair: FilePair,
}

impl LeafDifference {
    /// Creates a new leaf.
    #[must_use]
    pub fn new(logical_path: LogicalPath, pair: FilePair) -> Self {
        Self { logical_path, pair }
    }

    /// Extension used to group the leaf in the summary.
    #[must_use]
    pub fn extension_group(&self) -> String {
        self.pair
            .first
            .extension()
            .map_or_else(|| "no-extension".to_string(), |ext| format!(".{}", ext.to_string_lossy()))
    }
}

/// A pair that could not be compared automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncomparablePair {
    /// Logical path of the pair.
    pub logical_path: LogicalPath,
    /// Files on disk.
    pub pair: FilePair,
    /// Why the comparison failed.
    pub reason: String,
}

/// Fails when two paths carry different extensions.
pub(crate) fn check_same_extension(first: &Path, second: &Path) -> Result<()> {
    let ext1 = dotted_extension(first);
    let ext2 = dotted_extension(second);
    if ext1 == ext2 {
        Ok(())
    } else {
        Err(CompareError::MismatchedExtensions {
            first: ext1,
            second: ext2,
        })
    }
}

fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_pair_names() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("build-100.zip");
        let b = temp.path().join("build-101.zip");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let pair = ArtifactPair::new(&a, &b).unwrap();
        assert_eq!(pair.names(), ["build-100.zip", "build-101.zip"]);
    }

    #[test]
    fn test_artifact_pair_same_file_name_disambiguated() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("old")).unwrap();
        fs::create_dir_all(temp.path().join("new")).unwrap();
        let a = temp.path().join("old/target_files.zip");
        let b = temp.path().join("new/target_files.zip");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let pair = ArtifactPair::new(&a, &b).unwrap();
        assert_eq!(pair.names(), ["1-target_files.zip", "2-target_files.zip"]);
    }

    #[test]
    fn test_artifact_pair_missing() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.zip");
        fs::write(&a, b"a").unwrap();
        let err = ArtifactPair::new(&a, &temp.path().join("missing.zip")).unwrap_err();
        assert!(matches!(err, CompareError::MissingArtifact { .. }));
    }

    #[test]
    fn test_artifact_pair_mismatched_extension() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.zip");
        let b = temp.path().join("b.tar");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let err = ArtifactPair::new(&a, &b).unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_extension_group() {
        let leaf = LeafDifference::new(
            LogicalPath::new("SYSTEM/build.prop"),
            FilePair::new("/x/build.prop", "/y/build.prop"),
        );
        assert_eq!(leaf.extension_group(), ".prop");

        let kernel = LeafDifference::new(
            LogicalPath::new("BOOT/kernel"),
            FilePair::new("/x/kernel", "/y/kernel"),
        );
        assert_eq!(kernel.extension_group(), "no-extension");
    }

    #[test]
    fn test_both_regular_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.zip");
        let dir = temp.path().join("b.zip");
        fs::write(&file, b"a").unwrap();
        fs::create_dir_all(&dir).unwrap();

        assert!(FilePair::new(&file, &file).both_regular_files());
        assert!(!FilePair::new(&file, &dir).both_regular_files());
        assert!(!FilePair::new(&file, temp.path().join("missing.zip")).both_regular_files());

        #[cfg(unix)]
        {
            let link = temp.path().join("c.zip");
            std::os::unix::fs::symlink(&file, &link).unwrap();
            assert!(!FilePair::new(&file, &link).both_regular_files());
        }
    }
}
