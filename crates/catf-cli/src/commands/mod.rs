//! Command implementations.

pub mod build_info;
pub mod compare;
pub mod completion;
