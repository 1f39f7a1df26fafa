//! Single-image filesystem engine: fixed on-disk layout, contiguous block
//! allocation and maintenance passes over a memory-mapped disk image.
#![allow(clippy::cargo_common_metadata)]

pub mod allocator;
pub mod error;
pub mod fs;
pub mod layout;
pub mod metadata;
pub mod retention;
pub mod table;

pub use error::{ErrorClass, FsError, FsResult};
pub use fs::SimpleFs;
pub use layout::Geometry;
