//! Test utilities: in-memory archive builders and a scripted capability
//! backend.
//!
//! # Panics
//!
//! Functions in this module may panic on I/O errors since they are designed
//! for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::CompareError;
use crate::Result;
use crate::formats::CompressionCodec;
use crate::formats::ImageVariant;
use crate::tools::DiffBackend;
use crate::tools::FormatHandler;
use crate::tools::SystemTools;
use crate::tools::diff_trees;
use crate::types::FilePair;

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with mode 0o644.
///
/// # Examples
///
/// ```
/// use catf_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(&[("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::write::ZipWriter;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);

    for (path, data) in entries {
        zip.start_file(*path, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Creates an in-memory ZIP archive holding files followed by symlinks.
///
/// Each link is a tuple of (path, target).
#[must_use]
pub fn create_test_zip_with_links(entries: &[(&str, &[u8])], links: &[(&str, &str)]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::write::ZipWriter;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (path, data) in entries {
        zip.start_file(*path, options.unix_permissions(0o644)).unwrap();
        zip.write_all(data).unwrap();
    }
    for (path, target) in links {
        zip.add_symlink(*path, *target, options).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Creates an in-memory TAR archive from a list of entries.
#[must_use]
pub fn create_test_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    create_test_tar_with_links(entries, &[])
}

/// Creates an in-memory TAR archive holding files, directories and
/// symlinks.
///
/// Paths ending in `/` become directories. Each link is a tuple of
/// (path, target).
#[must_use]
pub fn create_test_tar_with_links(entries: &[(&str, &[u8])], links: &[(&str, &str)]) -> Vec<u8> {
    let mut ar = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        if path.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            ar.append_data(&mut header, path, std::io::empty()).unwrap();
        } else {
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            ar.append_data(&mut header, path, *data).unwrap();
        }
    }
    for (path, target) in links {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_link_name(target).unwrap();
        header.set_cksum();
        ar.append_data(&mut header, path, std::io::empty()).unwrap();
    }
    ar.into_inner().unwrap()
}

/// A [`FormatHandler`] and [`DiffBackend`] whose answers are scripted.
///
/// Anything not scripted is delegated to a wrapped [`SystemTools`] when one
/// is given, and otherwise answered in-process: containers and decompression
/// fail, file diffs compare contents ignoring whitespace, and nothing sniffs
/// as text.
///
/// # Examples
///
/// ```
/// use catf_core::test_utils::ScriptedTools;
/// use catf_core::tools::DiffBackend;
/// use std::path::Path;
///
/// let tools = ScriptedTools::new().with_text_file_suffix(".prop");
/// assert!(tools.is_text_file(Path::new("/x/build.prop")));
/// assert!(!tools.is_text_file(Path::new("/x/libc.so")));
/// ```
#[derive(Debug, Default)]
pub struct ScriptedTools {
    inner: Option<SystemTools>,
    text_files: HashSet<PathBuf>,
    text_suffixes: Vec<String>,
    images: HashMap<PathBuf, Vec<(String, Vec<u8>)>>,
    failing_images: HashSet<String>,
    signatures: HashMap<PathBuf, String>,
}

impl ScriptedTools {
    /// Creates a backend with no delegate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that delegates unscripted calls to `inner`.
    #[must_use]
    pub fn wrapping(inner: SystemTools) -> Self {
        Self {
            inner: Some(inner),
            ..Self::default()
        }
    }

    /// Sniffs this exact path as text.
    #[must_use]
    pub fn with_text_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.text_files.insert(path.into());
        self
    }

    /// Sniffs every path ending in `suffix` as text.
    #[must_use]
    pub fn with_text_file_suffix(mut self, suffix: &str) -> Self {
        self.text_suffixes.push(suffix.to_string());
        self
    }

    /// Unpacking the image at `path` yields these files.
    #[must_use]
    pub fn with_image_contents(mut self, path: impl Into<PathBuf>, files: &[(&str, &[u8])]) -> Self {
        let files = files
            .iter()
            .map(|(name, data)| ((*name).to_string(), data.to_vec()))
            .collect();
        self.images.insert(path.into(), files);
        self
    }

    /// Unpacking any image with this file name fails.
    #[must_use]
    pub fn with_failing_image(mut self, file_name: &str) -> Self {
        self.failing_images.insert(file_name.to_string());
        self
    }

    /// Signature inspection of the bundle at `path` prints `text`.
    #[must_use]
    pub fn with_signature(mut self, path: impl Into<PathBuf>, text: &str) -> Self {
        self.signatures.insert(path.into(), text.to_string());
        self
    }

    fn scripted_failure(program: &str) -> CompareError {
        CompareError::ToolFailed {
            program: program.to_string(),
            code: 1,
            stderr: "scripted failure".to_string(),
        }
    }
}

impl FormatHandler for ScriptedTools {
    fn extract_container(&self, source: &Path, dest: &Path) -> Result<()> {
        match &self.inner {
            Some(inner) => inner.extract_container(source, dest),
            None => Err(Self::scripted_failure("unzip")),
        }
    }

    fn extract_image(&self, source: &Path, dest: &Path, variant: ImageVariant) -> Result<()> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_images.contains(&name) {
            return Err(Self::scripted_failure("gradlew"));
        }
        if let Some(files) = self.images.get(source) {
            for (relative, data) in files {
                let target = dest.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(target, data)?;
            }
            return Ok(());
        }
        match &self.inner {
            Some(inner) => inner.extract_image(source, dest, variant),
            None => Err(Self::scripted_failure("7z")),
        }
    }

    fn decompress(
        &self,
        source: &Path,
        dest_dir: &Path,
        codec: CompressionCodec,
    ) -> Result<PathBuf> {
        match &self.inner {
            Some(inner) => inner.decompress(source, dest_dir, codec),
            None => Err(Self::scripted_failure(codec.name())),
        }
    }
}

impl DiffBackend for ScriptedTools {
    fn diff_directories(&self, first: &Path, second: &Path) -> Result<Vec<FilePair>> {
        diff_trees(first, second)
    }

    fn diff_files(&self, first: &Path, second: &Path, text_mode: bool) -> Result<String> {
        let a = fs::read(first).unwrap_or_default();
        let b = fs::read(second).unwrap_or_default();
        let squash = |data: &[u8]| -> Vec<u8> {
            data.iter().copied().filter(|c| !c.is_ascii_whitespace()).collect()
        };
        if squash(&a) == squash(&b) {
            return Ok(String::new());
        }
        if !text_mode {
            return Ok(format!(
                "Binary files {} and {} differ\n",
                first.display(),
                second.display()
            ));
        }
        let mut out = format!("--- {}\n+++ {}\n", first.display(), second.display());
        for line in String::from_utf8_lossy(&a).lines() {
            out.push_str(&format!("-{line}\n"));
        }
        for line in String::from_utf8_lossy(&b).lines() {
            out.push_str(&format!("+{line}\n"));
        }
        Ok(out)
    }

    fn is_text_file(&self, path: &Path) -> bool {
        if self.text_files.contains(path) {
            return true;
        }
        let name = path.to_string_lossy();
        if self.text_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return true;
        }
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.is_text_file(path))
    }

    fn inspect_signature(&self, bundle: &Path) -> Result<String> {
        if let Some(text) = self.signatures.get(bundle) {
            return Ok(text.clone());
        }
        match &self.inner {
            Some(inner) => inner.inspect_signature(bundle),
            None => Err(Self::scripted_failure("apksigner")),
        }
    }
}
