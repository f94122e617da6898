//! Core value types shared across the comparison pipeline.

mod logical_path;
mod pair;

pub use logical_path::LogicalPath;
pub use pair::Artifact;
pub use pair::ArtifactPair;
pub use pair::ComparisonNode;
pub use pair::FilePair;
pub use pair::LeafDifference;
pub use pair::UncomparablePair;
pub(crate) use pair::check_same_extension;
