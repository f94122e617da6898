//! Rendering of leaf differences into a tree of `.diff` files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use crate::CompareConfig;
use crate::Result;
use crate::report::ProgressCallback;
use crate::staging::StagingArea;
use crate::tools::DiffBackend;
use crate::types::FilePair;
use crate::types::LeafDifference;
use crate::types::LogicalPath;
use crate::types::UncomparablePair;

/// Trailing component of the directory holding a bundle's signatures.
const SIGNATURE_DIR: &str = "/META-INF";

/// Extensions of bundle signature blocks.
const SIGNATURE_EXTENSIONS: &[&str] = &["RSA", "DSA", "EC"];

/// A leaf with its rendered, non-empty diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiff {
    /// The leaf that was rendered.
    pub leaf: LeafDifference,
    /// Contents of the `.diff` file.
    pub text: String,
    /// Where the `.diff` file goes.
    pub target: PathBuf,
}

/// Result of rendering every leaf.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    /// Leaves with a non-empty diff, in input order.
    pub rendered: Vec<RenderedDiff>,
    /// Leaves whose diff could not be produced at all.
    pub failed: Vec<UncomparablePair>,
}

impl RenderOutcome {
    /// Writes every rendered diff to its target, creating directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or file cannot be written.
    pub fn write_tree(&self) -> Result<()> {
        for diff in &self.rendered {
            if let Some(parent) = diff.target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&diff.target, &diff.text)?;
        }
        Ok(())
    }
}

/// Turns leaf differences into diff texts.
pub struct DiffTreeBuilder<'a> {
    config: &'a CompareConfig,
    backend: &'a dyn DiffBackend,
    bundles: &'a BTreeMap<LogicalPath, FilePair>,
    names: [&'a str; 2],
    sorted_dir: PathBuf,
    signature_dir: PathBuf,
    entry_dir: PathBuf,
    progress: &'a dyn ProgressCallback,
}

impl<'a> DiffTreeBuilder<'a> {
    /// Creates a builder. Scratch space for sorted copies and signature dumps
    /// is taken from `staging`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directories cannot be created.
    pub fn new(
        config: &'a CompareConfig,
        backend: &'a dyn DiffBackend,
        staging: &'a StagingArea,
        bundles: &'a BTreeMap<LogicalPath, FilePair>,
        progress: &'a dyn ProgressCallback,
    ) -> Result<Self> {
        Ok(Self {
            config,
            backend,
            bundles,
            names: staging.names(),
            sorted_dir: staging.scratch("sorted")?,
            signature_dir: staging.scratch("apk-certs")?,
            entry_dir: staging.scratch("entries")?,
            progress,
        })
    }

    /// Renders every leaf below `output_dir`. Leaves whose diff is empty are
    /// dropped; leaves that cannot be diffed end up in
    /// [`RenderOutcome::failed`].
    #[must_use]
    pub fn render(&self, leaves: Vec<LeafDifference>, output_dir: &Path) -> RenderOutcome {
        let total = leaves.len();
        let results: Vec<_> = leaves
            .into_par_iter()
            .enumerate()
            .map(|(index, leaf)| {
                self.progress
                    .on_render(&leaf.logical_path, index + 1, total);
                let text = self.render_leaf(&leaf, index);
                (leaf, text)
            })
            .collect();

        let mut outcome = RenderOutcome::default();
        for (leaf, text) in results {
            match text {
                Ok(text) if text.trim().is_empty() => {
                    debug!(path = %leaf.logical_path, "empty diff dropped");
                }
                Ok(text) => {
                    let target = leaf.logical_path.diff_path(output_dir);
                    outcome.rendered.push(RenderedDiff { leaf, text, target });
                }
                Err(err) => {
                    warn!(path = %leaf.logical_path, error = %err, "could not render diff");
                    outcome.failed.push(UncomparablePair {
                        logical_path: leaf.logical_path,
                        pair: leaf.pair,
                        reason: err.to_string(),
                    });
                }
            }
        }
        outcome
    }

    fn render_leaf(&self, leaf: &LeafDifference, index: usize) -> Result<String> {
        let kinds = [
            EntryKind::of(&leaf.pair.first),
            EntryKind::of(&leaf.pair.second),
        ];
        if kinds.iter().any(EntryKind::is_special) {
            return self.entry_diff(&kinds, index);
        }

        let sniffed = if leaf.pair.first.exists() {
            &leaf.pair.first
        } else {
            &leaf.pair.second
        };
        let text_mode = self.backend.is_text_file(sniffed);

        let body = if let Some(bundle) = self.enclosing_bundle(&leaf.logical_path) {
            match self.signature_diff(bundle, index) {
                Ok(diff) => diff,
                Err(err) => {
                    warn!(path = %leaf.logical_path, error = %err, "signature inspection failed, using plain diff");
                    self.plain_diff(leaf, index, text_mode)?
                }
            }
        } else {
            self.plain_diff(leaf, index, text_mode)?
        };

        if text_mode || body.trim().is_empty() {
            return Ok(body);
        }
        Ok(format!(
            "File location on disk:\n{}: {}\n{}: {}\n\n\n{body}\n",
            self.names[0],
            leaf.pair.first.display(),
            self.names[1],
            leaf.pair.second.display(),
        ))
    }

    fn plain_diff(&self, leaf: &LeafDifference, index: usize, text_mode: bool) -> Result<String> {
        let sorted = leaf
            .logical_path
            .extension()
            .is_some_and(|ext| self.config.is_sorted_extension(ext));
        if sorted {
            match self.sorted_copies(&leaf.pair, index) {
                Ok(copies) => return self.backend.diff_files(&copies.first, &copies.second, text_mode),
                Err(err) => {
                    warn!(path = %leaf.logical_path, error = %err, "could not sort map file, using plain diff");
                }
            }
        }
        self.backend
            .diff_files(&leaf.pair.first, &leaf.pair.second, text_mode)
    }

    /// Bundle holding `path` when it is one of the bundle's signature blocks.
    fn enclosing_bundle(&self, path: &LogicalPath) -> Option<&FilePair> {
        let is_signature = path.extension().is_some_and(|ext| {
            SIGNATURE_EXTENSIONS
                .iter()
                .any(|sig| sig.eq_ignore_ascii_case(ext))
        });
        if !is_signature {
            return None;
        }
        let bundle = path.parent().strip_suffix(SIGNATURE_DIR)?;
        let bundle = LogicalPath::new(bundle);
        if !bundle.file_name().to_ascii_lowercase().ends_with(".apk") {
            return None;
        }
        self.bundles.get(&bundle)
    }

    fn signature_diff(&self, bundle: &FilePair, index: usize) -> Result<String> {
        let dir = self.signature_dir.join(index.to_string());
        fs::create_dir_all(&dir)?;
        let first = dir.join(self.names[0]);
        let second = dir.join(self.names[1]);
        fs::write(&first, self.backend.inspect_signature(&bundle.first)?)?;
        fs::write(&second, self.backend.inspect_signature(&bundle.second)?)?;
        self.backend.diff_files(&first, &second, true)
    }

    /// Diffs one-line descriptions of both sides instead of their contents.
    /// Links are never followed.
    fn entry_diff(&self, kinds: &[EntryKind; 2], index: usize) -> Result<String> {
        let dir = self.entry_dir.join(index.to_string());
        fs::create_dir_all(&dir)?;
        let first = dir.join(self.names[0]);
        let second = dir.join(self.names[1]);
        for (kind, path) in kinds.iter().zip([&first, &second]) {
            if let Some(description) = kind.describe() {
                fs::write(path, description)?;
            }
        }
        self.backend.diff_files(&first, &second, true)
    }

    fn sorted_copies(&self, pair: &FilePair, index: usize) -> Result<FilePair> {
        let dir = self.sorted_dir.join(index.to_string());
        let file_name = pair.file_name();
        let mut copies = Vec::with_capacity(2);
        for (side, name) in [&pair.first, &pair.second].into_iter().zip(self.names) {
            let target = dir.join(name).join(&file_name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            if side.exists() {
                let content = fs::read(side)?;
                fs::write(&target, sort_lines(&String::from_utf8_lossy(&content)))?;
            }
            copies.push(target);
        }
        let second = copies.pop().unwrap_or_default();
        let first = copies.pop().unwrap_or_default();
        Ok(FilePair::new(first, second))
    }
}

/// What sits at one side of a leaf, looked at without following links.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
    Absent,
    File,
    Directory,
    Symlink(PathBuf),
    Other,
}

impl EntryKind {
    fn of(path: &Path) -> Self {
        let Ok(meta) = fs::symlink_metadata(path) else {
            return Self::Absent;
        };
        let file_type = meta.file_type();
        if file_type.is_symlink() {
            fs::read_link(path).map_or(Self::Other, Self::Symlink)
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }

    fn is_special(&self) -> bool {
        !matches!(self, Self::Absent | Self::File)
    }

    fn describe(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::File => Some("regular file\n".to_string()),
            Self::Directory => Some("directory\n".to_string()),
            Self::Symlink(target) => Some(format!("symlink -> {}\n", target.display())),
            Self::Other => Some("special file\n".to_string()),
        }
    }
}

/// Sorts the lines of a text. The result always ends with a newline unless
/// it is empty.
///
/// # Examples
///
/// ```
/// use catf_core::render::sort_lines;
///
/// assert_eq!(sort_lines("b 2\na 1\nc 3"), "a 1\nb 2\nc 3\n");
/// ```
#[must_use]
pub fn sort_lines(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    lines.sort_unstable();
    let mut sorted = lines.join("\n");
    if !sorted.is_empty() {
        sorted.push('\n');
    }
    sorted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::report::NoopProgress;
    use crate::test_utils::ScriptedTools;
    use crate::types::ArtifactPair;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        staging: StagingArea,
        config: CompareConfig,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("old.zip");
        let b = temp.path().join("new.zip");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let artifacts = ArtifactPair::new(&a, &b).unwrap();
        let staging = StagingArea::new(temp.path().join("staging"), &artifacts, false);
        staging.prepare().unwrap();
        Fixture {
            config: CompareConfig::default(),
            staging,
            temp,
        }
    }

    fn leaf(fx: &Fixture, logical: &str, a: &[u8], b: &[u8]) -> LeafDifference {
        let first = fx.temp.path().join("1").join(logical);
        let second = fx.temp.path().join("2").join(logical);
        for (path, data) in [(&first, a), (&second, b)] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        LeafDifference::new(LogicalPath::new(logical), FilePair::new(first, second))
    }

    #[test]
    fn test_sort_lines() {
        assert_eq!(sort_lines("b\na\n"), "a\nb\n");
        assert_eq!(sort_lines(""), "");
        assert_eq!(sort_lines("only"), "only\n");
    }

    #[test]
    fn test_text_leaf_rendered_without_header() {
        let fx = fixture();
        let bundles = BTreeMap::new();
        let tools = ScriptedTools::new().with_text_file_suffix(".prop");
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let out = builder.render(
            vec![leaf(&fx, "SYSTEM/build.prop", b"a=1\n", b"a=2\n")],
            Path::new("/out"),
        );
        assert_eq!(out.rendered.len(), 1);
        let diff = &out.rendered[0];
        assert!(!diff.text.starts_with("File location on disk"));
        assert_eq!(diff.target, PathBuf::from("/out/SYSTEM/build.prop.diff"));
    }

    #[test]
    fn test_binary_leaf_gets_location_header() {
        let fx = fixture();
        let bundles = BTreeMap::new();
        let tools = ScriptedTools::new();
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let out = builder.render(
            vec![leaf(&fx, "lib/libfoo.so", b"\0one", b"\0two")],
            Path::new("/out"),
        );
        let text = &out.rendered[0].text;
        assert!(text.starts_with("File location on disk:\nold.zip: "));
        assert!(text.contains("\nnew.zip: "));
    }

    #[test]
    fn test_empty_diff_dropped() {
        let fx = fixture();
        let bundles = BTreeMap::new();
        let tools = ScriptedTools::new().with_text_file_suffix(".txt");
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let out = builder.render(vec![leaf(&fx, "a.txt", b"same\n", b"same\n")], Path::new("/out"));
        assert!(out.rendered.is_empty());
        assert!(out.failed.is_empty());
    }

    #[test]
    fn test_map_files_sorted_before_diff() {
        let fx = fixture();
        let bundles = BTreeMap::new();
        let tools = ScriptedTools::new().with_text_file_suffix(".map");
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let out = builder.render(
            vec![leaf(&fx, "etc/sym.map", b"b 2\na 1\n", b"a 1\nb 2\n")],
            Path::new("/out"),
        );
        assert!(out.rendered.is_empty());
    }

    #[test]
    fn test_signature_rendered_from_bundle() {
        let fx = fixture();
        let apk = leaf(&fx, "app/Foo.apk", b"apk1", b"apk2");
        let mut bundles = BTreeMap::new();
        bundles.insert(apk.logical_path.clone(), apk.pair.clone());

        let tools = ScriptedTools::new()
            .with_signature(&apk.pair.first, "Signer #1 certificate SHA-256 digest: aa\n")
            .with_signature(&apk.pair.second, "Signer #1 certificate SHA-256 digest: bb\n");
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let cert = leaf(&fx, "app/Foo.apk/META-INF/CERT.RSA", b"\x30one", b"\x30two");
        let out = builder.render(vec![cert], Path::new("/out"));
        assert_eq!(out.rendered.len(), 1);
        assert!(out.rendered[0].text.contains("digest: bb"));
    }

    #[test]
    fn test_signature_encoding_only_change_filtered() {
        let fx = fixture();
        let apk = leaf(&fx, "app/Foo.apk", b"apk1", b"apk2");
        let mut bundles = BTreeMap::new();
        bundles.insert(apk.logical_path.clone(), apk.pair.clone());

        let same = "Signer #1 certificate SHA-256 digest: aa\n";
        let tools = ScriptedTools::new()
            .with_signature(&apk.pair.first, same)
            .with_signature(&apk.pair.second, same);
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let cert = leaf(&fx, "app/Foo.apk/META-INF/CERT.RSA", b"\x30one", b"\x30two");
        let out = builder.render(vec![cert], Path::new("/out"));
        assert!(out.rendered.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_rendered_from_targets() {
        use std::os::unix::fs::symlink;
        let fx = fixture();
        let bundles = BTreeMap::new();
        let tools = ScriptedTools::new();
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let link = leaf(&fx, "SYSTEM/bin/ls", b"", b"");
        for (path, target) in [
            (&link.pair.first, "/system/bin/toybox"),
            (&link.pair.second, "/system/bin/busybox"),
        ] {
            fs::remove_file(path).unwrap();
            symlink(target, path).unwrap();
        }

        let out = builder.render(vec![link], Path::new("/out"));
        assert!(out.failed.is_empty());
        let text = &out.rendered[0].text;
        assert!(text.contains("-symlink -> /system/bin/toybox"));
        assert!(text.contains("+symlink -> /system/bin/busybox"));
        assert!(!text.starts_with("File location on disk"));
    }

    #[test]
    fn test_file_replaced_by_directory_described() {
        let fx = fixture();
        let bundles = BTreeMap::new();
        let tools = ScriptedTools::new();
        let builder =
            DiffTreeBuilder::new(&fx.config, &tools, &fx.staging, &bundles, &NoopProgress).unwrap();

        let replaced = leaf(&fx, "SYSTEM/foo", b"file", b"");
        fs::remove_file(&replaced.pair.second).unwrap();
        fs::create_dir_all(replaced.pair.second.join("bar")).unwrap();

        let out = builder.render(vec![replaced], Path::new("/out"));
        assert!(out.failed.is_empty());
        let text = &out.rendered[0].text;
        assert!(text.contains("-regular file"));
        assert!(text.contains("+directory"));
    }

    #[test]
    fn test_write_tree() {
        let fx = fixture();
        let output = fx.temp.path().join("diffs");
        let outcome = RenderOutcome {
            rendered: vec![RenderedDiff {
                leaf: leaf(&fx, "a/b.txt", b"1", b"2"),
                text: "-1\n+2\n".into(),
                target: LogicalPath::new("a/b.txt").diff_path(&output),
            }],
            failed: Vec::new(),
        };
        outcome.write_tree().unwrap();
        assert_eq!(fs::read_to_string(output.join("a/b.txt.diff")).unwrap(), "-1\n+2\n");
    }
}
