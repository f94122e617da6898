//! Default capability implementation backed by in-process codecs and the
//! usual Android host tools.

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use flate2::read::MultiGzDecoder;
use tracing::debug;
use walkdir::WalkDir;

use crate::CompareError;
use crate::Result;
use crate::deadline::Deadline;
use crate::formats::CompressionCodec;
use crate::formats::ImageVariant;
use crate::types::FilePair;

use super::DiffBackend;
use super::FormatHandler;
use super::dirdiff::diff_trees;
use super::process::Cmd;

/// Number of leading bytes inspected when sniffing for text.
pub(crate) const SNIFF_LEN: usize = 8 * 1024;

/// Work directory the image editor unpacks into, relative to its
/// installation.
const EDITOR_OUTPUT: &str = "build/unzip_boot";

/// Production [`FormatHandler`] and [`DiffBackend`].
///
/// Zip-family and tar containers and most codecs are handled in-process.
/// Disk images, `lz4`, file diffs and signature inspection shell out to
/// `simg2img`, `7z`, the boot image editor, `lz4`, `diff` and `apksigner`.
#[derive(Debug)]
pub struct SystemTools {
    image_tool: PathBuf,
    deadline: Deadline,
    // The editor always works in its own installation directory.
    editor_lock: Mutex<()>,
}

impl SystemTools {
    /// Creates the backend. `image_tool` is the boot image editor's
    /// installation directory.
    #[must_use]
    pub fn new(image_tool: impl Into<PathBuf>) -> Self {
        Self {
            image_tool: image_tool.into(),
            deadline: Deadline::unlimited(),
            editor_lock: Mutex::new(()),
        }
    }

    /// Applies a run deadline to every external command.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    fn cmd(&self, program: impl AsRef<str>) -> Cmd {
        Cmd::new(program).deadline(self.deadline)
    }

    fn extract_zip(source: &Path, dest: &Path) -> Result<()> {
        let invalid = |e: zip::result::ZipError| CompareError::InvalidArchive {
            path: source.to_path_buf(),
            reason: e.to_string(),
        };
        let file = File::open(source)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(invalid)?;
        // Links are created last so no later entry is written through one.
        let mut links = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(invalid)?;
            let Some(relative) = entry.enclosed_name() else {
                debug!(archive = %source.display(), entry = entry.name(), "skipping unsafe entry");
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            if is_zip_symlink(entry.unix_mode()) {
                let mut link_target = String::new();
                entry.read_to_string(&mut link_target)?;
                links.push((target, link_target));
                continue;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }

        for (path, link_target) in links {
            create_symlink(&link_target, &path)?;
        }
        Ok(())
    }

    fn extract_tar(source: &Path, dest: &Path) -> Result<()> {
        let file = File::open(source)?;
        let mut archive = tar::Archive::new(BufReader::new(file));
        archive
            .unpack(dest)
            .map_err(|e| CompareError::InvalidArchive {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn extract_with_archive_tool(&self, source: &Path, dest: &Path, sparse: bool) -> Result<()> {
        let name = file_name(source);
        let copied = dest.join(&name);
        fs::copy(source, &copied)?;

        let image = if sparse {
            let raw = dest.join(format!("{name}.iso"));
            self.cmd("simg2img").arg(&copied).arg(&raw).run()?;
            fs::remove_file(&copied)?;
            raw
        } else {
            copied
        };

        // Exit status 1 is a warning (e.g. unsupported special files).
        let result = self
            .cmd("7z")
            .args(["-bb0", "-bd", "-y", "x"])
            .arg(&image)
            .dir(dest)
            .allow_codes(&[1])
            .run();
        fs::remove_file(&image)?;
        result.map(|_| ())
    }

    fn extract_with_editor(&self, source: &Path, dest: &Path) -> Result<()> {
        let _guard = self
            .editor_lock
            .lock()
            .map_err(|_| io::Error::other("image editor lock poisoned"))?;

        let gradlew = self.image_tool.join("gradlew");
        if !gradlew.is_file() {
            return Err(CompareError::ToolNotFound {
                program: gradlew.display().to_string(),
            });
        }

        clear_images(&self.image_tool)?;
        let output = self.image_tool.join(EDITOR_OUTPUT);
        if output.exists() {
            fs::remove_dir_all(&output)?;
        }
        fs::copy(source, self.image_tool.join(file_name(source)))?;

        let result = self
            .cmd(gradlew.to_string_lossy())
            .arg("unpack")
            .dir(&self.image_tool)
            .run();
        clear_images(&self.image_tool)?;
        result?;

        if output.is_dir() {
            move_contents(&output, dest)?;
        }
        Ok(())
    }
}

impl FormatHandler for SystemTools {
    fn extract_container(&self, source: &Path, dest: &Path) -> Result<()> {
        debug!(source = %source.display(), dest = %dest.display(), "extracting container");
        let is_tar = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tar"));
        if is_tar {
            Self::extract_tar(source, dest)
        } else {
            Self::extract_zip(source, dest)
        }
    }

    fn extract_image(&self, source: &Path, dest: &Path, variant: ImageVariant) -> Result<()> {
        match variant {
            ImageVariant::Skipped => Ok(()),
            ImageVariant::ArchiveTool { sparse } => {
                self.extract_with_archive_tool(source, dest, sparse)
            }
            ImageVariant::ImageEditor => self.extract_with_editor(source, dest),
        }
    }

    fn decompress(
        &self,
        source: &Path,
        dest_dir: &Path,
        codec: CompressionCodec,
    ) -> Result<PathBuf> {
        let target = dest_dir.join(codec.output_name(source));
        debug!(source = %source.display(), codec = codec.name(), "decompressing");

        let corrupt = |e: io::Error| CompareError::InvalidArchive {
            path: source.to_path_buf(),
            reason: e.to_string(),
        };
        let reader = || -> Result<BufReader<File>> { Ok(BufReader::new(File::open(source)?)) };
        let mut out = File::create(&target)?;

        match codec {
            CompressionCodec::Gzip => {
                io::copy(&mut MultiGzDecoder::new(reader()?), &mut out).map_err(corrupt)?;
            }
            CompressionCodec::Xz => {
                io::copy(&mut xz2::read::XzDecoder::new(reader()?), &mut out).map_err(corrupt)?;
            }
            CompressionCodec::Bzip2 => {
                io::copy(&mut bzip2::read::BzDecoder::new(reader()?), &mut out)
                    .map_err(corrupt)?;
            }
            CompressionCodec::Zstd => {
                let mut decoder = zstd::stream::read::Decoder::new(reader()?)?;
                io::copy(&mut decoder, &mut out).map_err(corrupt)?;
            }
            CompressionCodec::Lz4 => {
                drop(out);
                self.cmd("lz4")
                    .args(["-q", "-d", "-f"])
                    .arg(source)
                    .arg(&target)
                    .run()?;
            }
        }
        Ok(target)
    }
}

impl DiffBackend for SystemTools {
    fn diff_directories(&self, first: &Path, second: &Path) -> Result<Vec<FilePair>> {
        diff_trees(first, second)
    }

    fn diff_files(&self, first: &Path, second: &Path, text_mode: bool) -> Result<String> {
        let flags = if text_mode { "-NaurwB" } else { "-NwB" };
        let output = self
            .cmd("diff")
            .arg(flags)
            .arg(first)
            .arg(second)
            .allow_codes(&[1])
            .run()?;
        Ok(output.stdout)
    }

    fn is_text_file(&self, path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        let mut head = Vec::with_capacity(SNIFF_LEN);
        if file.take(SNIFF_LEN as u64).read_to_end(&mut head).is_err() {
            return false;
        }
        looks_like_text(&head)
    }

    fn inspect_signature(&self, bundle: &Path) -> Result<String> {
        let output = self
            .cmd("apksigner")
            .args(["verify", "-v", "--print-certs"])
            .arg(bundle)
            .run()?;
        Ok(output.stdout)
    }
}

/// Text heuristic over a file prefix: non-empty, no NUL bytes, and either
/// valid UTF-8 (a truncated trailing sequence is fine) or at least 95%
/// printable ASCII.
pub(crate) fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() || head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => return true,
        Err(e) if e.error_len().is_none() => return true,
        Err(_) => {}
    }
    let printable = head
        .iter()
        .filter(|&&b| matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x20..=0x7e))
        .count();
    printable * 100 >= head.len() * 95
}

fn is_zip_symlink(mode: Option<u32>) -> bool {
    const S_IFMT: u32 = 0o170_000;
    const S_IFLNK: u32 = 0o120_000;
    mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK)
}

#[cfg(unix)]
fn create_symlink(target: &str, path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(_) => {}
    }
    std::os::unix::fs::symlink(target, path)
}

/// Without symlink support the target path is kept as file content.
#[cfg(not(unix))]
fn create_symlink(target: &str, path: &Path) -> io::Result<()> {
    fs::write(path, target)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn clear_images(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "img") {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Moves every entry of `from` into `to`, copying when a rename crosses
/// filesystems.
fn move_contents(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if fs::rename(entry.path(), &target).is_err() {
            copy_tree(&entry.path(), &target)?;
        }
    }
    fs::remove_dir_all(from)?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    if from.is_file() {
        fs::copy(from, to)?;
        return Ok(());
    }
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
