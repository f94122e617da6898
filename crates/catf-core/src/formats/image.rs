//! Disk and filesystem image unpacking.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::staging::StagingPair;
use crate::tools::FormatHandler;
use crate::types::FilePair;

use super::detect::ImageVariant;
use super::traits::ExtractionStrategy;

/// Unpacks images through the format handler, then drops the tool logs the
/// image editor leaves behind in the top level of its output.
#[derive(Debug, Clone, Copy)]
pub struct ImageUnpack {
    variant: ImageVariant,
}

impl ImageUnpack {
    /// Creates the strategy for one image variant.
    #[must_use]
    pub const fn new(variant: ImageVariant) -> Self {
        Self { variant }
    }
}

impl ExtractionStrategy for ImageUnpack {
    fn name(&self) -> &'static str {
        "image"
    }

    fn unpack(
        &self,
        pair: &FilePair,
        staging: &StagingPair,
        handler: &dyn FormatHandler,
    ) -> Result<()> {
        if self.variant == ImageVariant::Skipped {
            return Ok(());
        }
        handler.extract_image(&pair.first, &staging.first, self.variant)?;
        handler.extract_image(&pair.second, &staging.second, self.variant)?;
        remove_logs(&staging.first)?;
        remove_logs(&staging.second)?;
        Ok(())
    }
}

fn remove_logs(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "log") {
            debug!(log = %path.display(), "removing image tool log");
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
