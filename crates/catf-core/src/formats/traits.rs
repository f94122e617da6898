//! Common trait for extraction strategies.

use crate::Result;
use crate::staging::StagingPair;
use crate::tools::FormatHandler;
use crate::types::FilePair;

/// Unpacks both sides of a container pair into their staging locations.
///
/// Strategies only sequence the format handler's primitives; the comparator
/// owns staging reuse and the structural diff of the two unpacked trees.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Unpacks `pair` into `staging`. Both staging directories exist and are
    /// empty when this is called.
    ///
    /// # Errors
    ///
    /// Returns an error if any unpack primitive fails; the pair is then
    /// reported as uncomparable.
    fn unpack(&self, pair: &FilePair, staging: &StagingPair, handler: &dyn FormatHandler)
    -> Result<()>;
}
