//! Recursive comparison of composite build artifacts.
//!
//! `catf-core` unpacks two versions of a build artifact (an Android
//! target-files archive holding disk images, packages, bundles and nested
//! archives), follows every differing container down to the files that
//! actually changed, and renders those files as a tree of `.diff` files
//! addressed by their path inside the original artifacts.
//!
//! # Examples
//!
//! ```no_run
//! use catf_core::CompareConfig;
//! use catf_core::compare_artifacts;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CompareConfig::default().with_output_dir("diffs");
//! let report = compare_artifacts("build-100.zip", "build-101.zip", &config)?;
//! println!("{} files differ", report.total_differing());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod buildinfo;
pub mod compare;
pub mod config;
pub mod deadline;
pub mod dedup;
pub mod error;
pub mod formats;
pub mod render;
pub mod report;
pub mod resolve;
pub mod staging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tools;
pub mod types;

// Re-export main API types
pub use api::compare_artifacts;
pub use api::compare_artifacts_with;
pub use buildinfo::read_build_info;
pub use config::CompareConfig;
pub use config::FailurePolicy;
pub use config::ImageRules;
pub use error::CompareError;
pub use error::Result;
pub use report::ComparisonReport;
pub use report::NoopProgress;
pub use report::ProgressCallback;
