//! Compressed single-file formats.
//!
//! A compressed file holds exactly one payload. Both sides are decompressed
//! into their staging locations and the resulting one-file trees are diffed.
//!
//! # Supported Codecs
//!
//! - **Gzip** (.gz): ramdisks, notice files
//! - **Lz4** (.lz4): kernel and ramdisk images on newer devices
//! - **Xz** (.xz), **Bzip2** (.bz2), **Zstd** (.zst): vendor payloads

use std::path::Path;

use crate::Result;
use crate::staging::StagingPair;
use crate::tools::FormatHandler;
use crate::types::FilePair;

use super::traits::ExtractionStrategy;

/// Compression codec of a single-file payload.
///
/// # Examples
///
/// ```
/// use catf_core::formats::CompressionCodec;
///
/// assert_eq!(CompressionCodec::from_extension("gz"), Some(CompressionCodec::Gzip));
/// assert_eq!(CompressionCodec::Lz4.extension(), "lz4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionCodec {
    /// Gzip (deflate).
    Gzip,
    /// LZ4 frame format.
    Lz4,
    /// Xz (LZMA2).
    Xz,
    /// Bzip2.
    Bzip2,
    /// Zstandard.
    Zstd,
}

impl CompressionCodec {
    /// Maps a file extension (without dot, case-insensitive) to a codec.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "gz" => Some(Self::Gzip),
            "lz4" => Some(Self::Lz4),
            "xz" => Some(Self::Xz),
            "bz2" => Some(Self::Bzip2),
            "zst" => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Returns the file extension for this codec.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Lz4 => "lz4",
            Self::Xz => "xz",
            Self::Bzip2 => "bz2",
            Self::Zstd => "zst",
        }
    }

    /// Returns a human-readable name for this codec.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Lz4 => "lz4",
            Self::Xz => "xz",
            Self::Bzip2 => "bzip2",
            Self::Zstd => "zstd",
        }
    }

    /// Name of the decompressed payload: the source file name with the codec
    /// extension removed.
    #[must_use]
    pub fn output_name(self, source: &Path) -> String {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = format!(".{}", self.extension());
        match name.len().checked_sub(suffix.len()) {
            Some(cut)
                if cut > 0
                    && name
                        .get(cut..)
                        .is_some_and(|tail| tail.eq_ignore_ascii_case(&suffix)) =>
            {
                name[..cut].to_string()
            }
            _ => format!("{name}.out"),
        }
    }
}

/// Decompress-single-file strategy.
#[derive(Debug, Clone, Copy)]
pub struct Decompress {
    codec: CompressionCodec,
}

impl Decompress {
    /// Creates the strategy for one codec.
    #[must_use]
    pub const fn new(codec: CompressionCodec) -> Self {
        Self { codec }
    }
}

impl ExtractionStrategy for Decompress {
    fn name(&self) -> &'static str {
        self.codec.name()
    }

    fn unpack(
        &self,
        pair: &FilePair,
        staging: &StagingPair,
        handler: &dyn FormatHandler,
    ) -> Result<()> {
        handler.decompress(&pair.first, &staging.first, self.codec)?;
        handler.decompress(&pair.second, &staging.second, self.codec)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_from_extension() {
        assert_eq!(CompressionCodec::from_extension("GZ"), Some(CompressionCodec::Gzip));
        assert_eq!(CompressionCodec::from_extension("lz4"), Some(CompressionCodec::Lz4));
        assert_eq!(CompressionCodec::from_extension("xz"), Some(CompressionCodec::Xz));
        assert_eq!(CompressionCodec::from_extension("bz2"), Some(CompressionCodec::Bzip2));
        assert_eq!(CompressionCodec::from_extension("zst"), Some(CompressionCodec::Zstd));
        assert_eq!(CompressionCodec::from_extension("zip"), None);
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(CompressionCodec::Gzip.name(), "gzip");
        assert_eq!(CompressionCodec::Bzip2.name(), "bzip2");
        assert_eq!(Decompress::new(CompressionCodec::Zstd).name(), "zstd");
    }

    #[test]
    fn test_output_name_strips_extension() {
        let codec = CompressionCodec::Gzip;
        assert_eq!(codec.output_name(Path::new("/a/NOTICE.html.gz")), "NOTICE.html");
        assert_eq!(codec.output_name(Path::new("/a/ramdisk.GZ")), "ramdisk");
    }

    #[test]
    fn test_output_name_without_matching_extension() {
        let codec = CompressionCodec::Lz4;
        assert_eq!(codec.output_name(Path::new("kernel")), "kernel.out");
        assert_eq!(codec.output_name(Path::new(".lz4")), ".lz4.out");
    }
}
