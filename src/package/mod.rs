//! Local package state
//!
//! Version normalization, the per-package metadata file, and the on-disk
//! layout of archives and unpacked packages.

mod metadata;
mod store;
mod version;

pub use metadata::{METADATA_FILE, MetadataError, PackageMetadata};
pub use store::{LocalPackageState, PackageStore};
pub use version::Version;
