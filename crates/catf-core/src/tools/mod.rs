//! Capabilities the comparison engine needs from the outside world.
//!
//! Unpacking and diffing are expressed as two traits so the engine can be
//! driven by [`SystemTools`] in production and by scripted fakes in tests.

mod dirdiff;
mod process;
mod system;

pub use dirdiff::diff_trees;
pub use process::Cmd;
pub use process::CommandOutput;
pub use system::SystemTools;

use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::formats::CompressionCodec;
use crate::formats::ImageVariant;
use crate::types::FilePair;

/// Unpack primitives.
pub trait FormatHandler: Send + Sync {
    /// Extracts a zip-family or tar container into an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be read or written out.
    fn extract_container(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Unpacks a disk image into an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the image tool is missing or fails.
    fn extract_image(&self, source: &Path, dest: &Path, variant: ImageVariant) -> Result<()>;

    /// Decompresses a single file into `dest_dir`, returning the output path.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is corrupt or the codec's tool is
    /// missing.
    fn decompress(&self, source: &Path, dest_dir: &Path, codec: CompressionCodec)
    -> Result<PathBuf>;
}

/// Diffing and inspection primitives.
pub trait DiffBackend: Send + Sync {
    /// Lists file pairs that differ between two directory trees.
    ///
    /// Paths present on one side only are reported with the missing side's
    /// would-be location. Whitespace and blank-line differences are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if either tree cannot be walked.
    fn diff_directories(&self, first: &Path, second: &Path) -> Result<Vec<FilePair>>;

    /// Produces the textual diff of two files. `text_mode` selects a unified
    /// line diff; otherwise only a differs/identical statement is produced.
    /// An empty result means no reportable difference.
    ///
    /// # Errors
    ///
    /// Returns an error if the diff tool fails.
    fn diff_files(&self, first: &Path, second: &Path, text_mode: bool) -> Result<String>;

    /// Returns `true` if the file looks like text.
    fn is_text_file(&self, path: &Path) -> bool;

    /// Renders the signing certificates of a bundle as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature inspector fails.
    fn inspect_signature(&self, bundle: &Path) -> Result<String>;
}
