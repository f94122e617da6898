//! Format classification of file pairs.

use std::path::Path;

use crate::Result;
use crate::config::ImageRules;
use crate::tools::DiffBackend;
use crate::types::FilePair;
use crate::types::check_same_extension;

use super::compression::CompressionCodec;
use super::compression::Decompress;
use super::image::ImageUnpack;
use super::package::SingleStage;
use super::package::TwoStage;
use super::traits::ExtractionStrategy;

/// How a disk image is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageVariant {
    /// Never compared.
    Skipped,
    /// Extracted with the archive tool, optionally after a sparse-to-raw
    /// conversion.
    ArchiveTool {
        /// Convert from the sparse format first.
        sparse: bool,
    },
    /// Unpacked with the external boot image editor.
    ImageEditor,
}

/// Format of a file pair. Every variant maps to at most one extraction
/// strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// Text content; the pair is itself the leaf difference.
    PlainText,
    /// Disk image (`.img`).
    Image(ImageVariant),
    /// Package holding an embedded package (`.capex`).
    TwoStagePackage,
    /// Package with compressed auxiliary metadata (`.apex`).
    Package,
    /// Signed application bundle (`.apk`).
    Bundle,
    /// Ordinary archive (`.zip`, `.jar`, `.tar`).
    Archive,
    /// Compressed single file.
    Compressed(CompressionCodec),
    /// Raw filesystem image (`.ext4`).
    FilesystemImage,
    /// No known strategy; reported as-is.
    Unsupported,
}

impl FormatTag {
    /// Format implied by a path's extension alone. Images are routed with
    /// `rules`; content is never inspected.
    #[must_use]
    pub fn from_path(path: &Path, rules: &ImageRules) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "img" => Self::Image(image_variant(path, rules)),
            "capex" => Self::TwoStagePackage,
            "apex" => Self::Package,
            "apk" => Self::Bundle,
            "zip" | "jar" | "tar" => Self::Archive,
            "ext4" => Self::FilesystemImage,
            other => CompressionCodec::from_extension(other)
                .map_or(Self::Unsupported, Self::Compressed),
        }
    }

    /// Returns `true` for formats that are unpacked and compared recursively.
    #[must_use]
    pub const fn is_container(self) -> bool {
        !matches!(self, Self::PlainText | Self::Unsupported)
    }

    /// Staging namespace for this format. One directory per namespace
    /// under the staging root.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Image(_) => "imgs",
            Self::TwoStagePackage => "capex",
            Self::Package => "apex",
            Self::Bundle => "apks",
            Self::Archive => "zip",
            Self::Compressed(codec) => codec.extension(),
            Self::FilesystemImage => "ext4",
            Self::PlainText | Self::Unsupported => "leaf",
        }
    }

    /// Extraction strategy, or `None` for terminal formats.
    #[must_use]
    pub fn strategy(self) -> Option<Box<dyn ExtractionStrategy>> {
        match self {
            Self::PlainText | Self::Unsupported | Self::Image(ImageVariant::Skipped) => None,
            Self::Image(variant) => Some(Box::new(ImageUnpack::new(variant))),
            Self::TwoStagePackage => Some(Box::new(TwoStage::original_apex())),
            Self::Package => Some(Box::new(SingleStage::with_notice())),
            Self::Bundle | Self::Archive => Some(Box::new(SingleStage::plain())),
            Self::Compressed(codec) => Some(Box::new(Decompress::new(codec))),
            Self::FilesystemImage => Some(Box::new(ImageUnpack::new(ImageVariant::ArchiveTool {
                sparse: false,
            }))),
        }
    }
}

fn image_variant(path: &Path, rules: &ImageRules) -> ImageVariant {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let listed = |list: &[String]| list.iter().any(|entry| *entry == name);

    if listed(&rules.skipped) {
        ImageVariant::Skipped
    } else if listed(&rules.sparse) {
        ImageVariant::ArchiveTool { sparse: true }
    } else if listed(&rules.raw) {
        ImageVariant::ArchiveTool { sparse: false }
    } else {
        ImageVariant::ImageEditor
    }
}

/// Classifies a file pair.
///
/// Images are classified by name before any content sniffing; every other
/// pair whose first file sniffs as text is [`FormatTag::PlainText`].
///
/// # Errors
///
/// Returns [`CompareError::MismatchedExtensions`](crate::CompareError) if the
/// two files carry different extensions.
pub fn classify(pair: &FilePair, backend: &dyn DiffBackend, rules: &ImageRules) -> Result<FormatTag> {
    check_same_extension(&pair.first, &pair.second)?;

    let tag = FormatTag::from_path(&pair.first, rules);
    if matches!(tag, FormatTag::Image(_)) {
        return Ok(tag);
    }
    if backend.is_text_file(&pair.first) {
        return Ok(FormatTag::PlainText);
    }
    Ok(tag)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::CompareError;
    use crate::test_utils::ScriptedTools;
    use std::path::PathBuf;

    fn tag(path: &str) -> FormatTag {
        FormatTag::from_path(&PathBuf::from(path), &ImageRules::default())
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(tag("a/b.capex"), FormatTag::TwoStagePackage);
        assert_eq!(tag("a/b.apex"), FormatTag::Package);
        assert_eq!(tag("a/b.apk"), FormatTag::Bundle);
        assert_eq!(tag("a/b.zip"), FormatTag::Archive);
        assert_eq!(tag("a/b.JAR"), FormatTag::Archive);
        assert_eq!(tag("a/b.ext4"), FormatTag::FilesystemImage);
        assert_eq!(tag("a/b.gz"), FormatTag::Compressed(CompressionCodec::Gzip));
        assert_eq!(tag("a/b.lz4"), FormatTag::Compressed(CompressionCodec::Lz4));
        assert_eq!(tag("a/b.so"), FormatTag::Unsupported);
        assert_eq!(tag("a/kernel"), FormatTag::Unsupported);
    }

    #[test]
    fn test_image_routing() {
        assert_eq!(tag("IMAGES/userdata.img"), FormatTag::Image(ImageVariant::Skipped));
        assert_eq!(
            tag("IMAGES/system.img"),
            FormatTag::Image(ImageVariant::ArchiveTool { sparse: true })
        );
        assert_eq!(
            tag("IMAGES/ramdisk.img"),
            FormatTag::Image(ImageVariant::ArchiveTool { sparse: false })
        );
        assert_eq!(tag("IMAGES/boot.img"), FormatTag::Image(ImageVariant::ImageEditor));
    }

    #[test]
    fn test_containers() {
        assert!(FormatTag::Archive.is_container());
        assert!(FormatTag::Image(ImageVariant::Skipped).is_container());
        assert!(!FormatTag::PlainText.is_container());
        assert!(!FormatTag::Unsupported.is_container());
    }

    #[test]
    fn test_strategy_presence() {
        assert!(FormatTag::PlainText.strategy().is_none());
        assert!(FormatTag::Unsupported.strategy().is_none());
        assert!(FormatTag::Image(ImageVariant::Skipped).strategy().is_none());
        assert_eq!(FormatTag::Bundle.strategy().unwrap().name(), "single-stage");
        assert_eq!(FormatTag::TwoStagePackage.strategy().unwrap().name(), "two-stage");
        assert_eq!(FormatTag::FilesystemImage.strategy().unwrap().name(), "image");
    }

    #[test]
    fn test_namespaces_are_distinct_for_containers() {
        use std::collections::HashSet;
        let tags = [
            FormatTag::Image(ImageVariant::ImageEditor),
            FormatTag::TwoStagePackage,
            FormatTag::Package,
            FormatTag::Bundle,
            FormatTag::Archive,
            FormatTag::Compressed(CompressionCodec::Gzip),
            FormatTag::Compressed(CompressionCodec::Lz4),
            FormatTag::FilesystemImage,
        ];
        let namespaces: HashSet<_> = tags.iter().map(|t| t.namespace()).collect();
        assert_eq!(namespaces.len(), tags.len());
    }

    #[test]
    fn test_classify_sniffs_text_before_extension() {
        let tools = ScriptedTools::new().with_text_file("/a/notes.zip");
        let pair = FilePair::new("/a/notes.zip", "/b/notes.zip");
        let tag = classify(&pair, &tools, &ImageRules::default()).unwrap();
        assert_eq!(tag, FormatTag::PlainText);
    }

    #[test]
    fn test_classify_image_before_sniffing() {
        let tools = ScriptedTools::new().with_text_file("/a/boot.img");
        let pair = FilePair::new("/a/boot.img", "/b/boot.img");
        let tag = classify(&pair, &tools, &ImageRules::default()).unwrap();
        assert_eq!(tag, FormatTag::Image(ImageVariant::ImageEditor));
    }

    #[test]
    fn test_classify_mismatch_is_fatal() {
        let tools = ScriptedTools::new();
        let pair = FilePair::new("/a/x.apk", "/b/x.zip");
        let err = classify(&pair, &tools, &ImageRules::default()).unwrap_err();
        assert!(matches!(err, CompareError::MismatchedExtensions { .. }));
    }
}
