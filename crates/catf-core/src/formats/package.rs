//! Zip-based package formats.
//!
//! Bundles, plain archives and packages are unpacked with a single container
//! extraction per side. Packages additionally ship their notice file
//! compressed; it is decompressed in place when both sides carry it, so the
//! notice shows up as a text difference instead of an opaque `.gz` leaf.
//!
//! Compressed packages embed the real package as a member named
//! `original_apex`, which is unpacked in place of the member itself.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::staging::StagingPair;
use crate::tools::FormatHandler;
use crate::types::FilePair;

use super::compression::CompressionCodec;
use super::traits::ExtractionStrategy;

/// Location of the compressed notice file inside a package.
pub const NOTICE_MEMBER: &str = "assets/NOTICE.html.gz";

/// Single-stage container unpack.
#[derive(Debug, Clone, Copy)]
pub struct SingleStage {
    notice: bool,
}

impl SingleStage {
    /// Plain unpack, used for bundles and archives.
    #[must_use]
    pub const fn plain() -> Self {
        Self { notice: false }
    }

    /// Unpack followed by notice decompression, used for packages.
    #[must_use]
    pub const fn with_notice() -> Self {
        Self { notice: true }
    }
}

impl ExtractionStrategy for SingleStage {
    fn name(&self) -> &'static str {
        "single-stage"
    }

    fn unpack(
        &self,
        pair: &FilePair,
        staging: &StagingPair,
        handler: &dyn FormatHandler,
    ) -> Result<()> {
        handler.extract_container(&pair.first, &staging.first)?;
        handler.extract_container(&pair.second, &staging.second)?;
        if self.notice {
            decompress_notice(staging, handler)?;
        }
        Ok(())
    }
}

/// Two-stage unpack of packages that embed another package.
#[derive(Debug, Clone, Copy)]
pub struct TwoStage {
    inner_member: &'static str,
}

impl TwoStage {
    /// Strategy for compressed packages, whose payload is `original_apex`.
    #[must_use]
    pub const fn original_apex() -> Self {
        Self {
            inner_member: "original_apex",
        }
    }

    fn unpack_side(&self, source: &Path, dest: &Path, handler: &dyn FormatHandler) -> Result<()> {
        handler.extract_container(source, dest)?;

        let member = dest.join(self.inner_member);
        if !member.is_file() {
            debug!(package = %source.display(), "no embedded package");
            return Ok(());
        }

        // The member becomes a directory of the same name.
        let staged = dest.join(format!("{}.apex", self.inner_member));
        fs::rename(&member, &staged)?;
        fs::create_dir_all(&member)?;
        handler.extract_container(&staged, &member)?;
        fs::remove_file(&staged)?;
        Ok(())
    }
}

impl ExtractionStrategy for TwoStage {
    fn name(&self) -> &'static str {
        "two-stage"
    }

    fn unpack(
        &self,
        pair: &FilePair,
        staging: &StagingPair,
        handler: &dyn FormatHandler,
    ) -> Result<()> {
        self.unpack_side(&pair.first, &staging.first, handler)?;
        self.unpack_side(&pair.second, &staging.second, handler)?;

        let inner = StagingPair {
            first: staging.first.join(self.inner_member),
            second: staging.second.join(self.inner_member),
        };
        decompress_notice(&inner, handler)
    }
}

/// Decompresses the notice member in place on both sides, only when both
/// sides carry it.
fn decompress_notice(staging: &StagingPair, handler: &dyn FormatHandler) -> Result<()> {
    let first = staging.first.join(NOTICE_MEMBER);
    let second = staging.second.join(NOTICE_MEMBER);
    if !(first.is_file() && second.is_file()) {
        return Ok(());
    }

    for notice in [first, second] {
        let dir = notice.parent().unwrap_or(Path::new("."));
        handler.decompress(&notice, dir, CompressionCodec::Gzip)?;
        fs::remove_file(&notice)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_zip;
    use crate::tools::SystemTools;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn staging_in(temp: &TempDir) -> StagingPair {
        let staging = StagingPair {
            first: temp.path().join("stage/1"),
            second: temp.path().join("stage/2"),
        };
        fs::create_dir_all(&staging.first).unwrap();
        fs::create_dir_all(&staging.second).unwrap();
        staging
    }

    #[test]
    fn test_single_stage_unpacks_both_sides() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.zip");
        let b = temp.path().join("b.zip");
        fs::write(&a, create_test_zip(&[("etc/a.txt", b"one")])).unwrap();
        fs::write(&b, create_test_zip(&[("etc/a.txt", b"two")])).unwrap();

        let staging = staging_in(&temp);
        let tools = SystemTools::new(temp.path().join("gradlew"));
        SingleStage::plain()
            .unpack(&FilePair::new(&a, &b), &staging, &tools)
            .unwrap();

        assert_eq!(fs::read(staging.first.join("etc/a.txt")).unwrap(), b"one");
        assert_eq!(fs::read(staging.second.join("etc/a.txt")).unwrap(), b"two");
    }

    #[test]
    fn test_notice_decompressed_when_present_on_both_sides() {
        let temp = TempDir::new().unwrap();
        let notice = gzip(b"<html>notice</html>");
        let a = temp.path().join("a.apex");
        let b = temp.path().join("b.apex");
        fs::write(&a, create_test_zip(&[(NOTICE_MEMBER, notice.as_slice())])).unwrap();
        fs::write(&b, create_test_zip(&[(NOTICE_MEMBER, notice.as_slice())])).unwrap();

        let staging = staging_in(&temp);
        let tools = SystemTools::new(temp.path().join("gradlew"));
        SingleStage::with_notice()
            .unpack(&FilePair::new(&a, &b), &staging, &tools)
            .unwrap();

        for side in [&staging.first, &staging.second] {
            assert!(!side.join(NOTICE_MEMBER).exists());
            assert_eq!(
                fs::read(side.join("assets/NOTICE.html")).unwrap(),
                b"<html>notice</html>"
            );
        }
    }

    #[test]
    fn test_notice_left_compressed_when_one_side_lacks_it() {
        let temp = TempDir::new().unwrap();
        let notice = gzip(b"notice");
        let a = temp.path().join("a.apex");
        let b = temp.path().join("b.apex");
        fs::write(&a, create_test_zip(&[(NOTICE_MEMBER, notice.as_slice())])).unwrap();
        fs::write(&b, create_test_zip(&[("apex_manifest.pb", b"m")])).unwrap();

        let staging = staging_in(&temp);
        let tools = SystemTools::new(temp.path().join("gradlew"));
        SingleStage::with_notice()
            .unpack(&FilePair::new(&a, &b), &staging, &tools)
            .unwrap();

        assert!(staging.first.join(NOTICE_MEMBER).exists());
        assert!(!staging.first.join("assets/NOTICE.html").exists());
    }

    #[test]
    fn test_two_stage_replaces_embedded_member() {
        let temp = TempDir::new().unwrap();
        let inner = create_test_zip(&[("apex_payload.img", b"payload")]);
        let a = temp.path().join("a.capex");
        let b = temp.path().join("b.capex");
        for path in [&a, &b] {
            fs::write(path, create_test_zip(&[("original_apex", inner.as_slice())])).unwrap();
        }

        let staging = staging_in(&temp);
        let tools = SystemTools::new(temp.path().join("gradlew"));
        TwoStage::original_apex()
            .unpack(&FilePair::new(&a, &b), &staging, &tools)
            .unwrap();

        for side in [&staging.first, &staging.second] {
            assert!(side.join("original_apex").is_dir());
            assert!(!side.join("original_apex.apex").exists());
            assert_eq!(
                fs::read(side.join("original_apex/apex_payload.img")).unwrap(),
                b"payload"
            );
        }
    }
}
