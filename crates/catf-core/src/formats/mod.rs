//! Format classification and the extraction strategy for each format.

pub mod compression;
pub mod detect;
pub mod image;
pub mod package;
pub mod traits;

pub use compression::CompressionCodec;
pub use compression::Decompress;
pub use detect::FormatTag;
pub use detect::ImageVariant;
pub use detect::classify;
pub use image::ImageUnpack;
pub use package::SingleStage;
pub use package::TwoStage;
pub use traits::ExtractionStrategy;
