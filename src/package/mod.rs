//! Package data model
//!
//! Groups and versions as produced by sources, the manifest/descriptor/sidecar
//! files written for installed packages, and the on-disk layout of an install root.

mod layout;
mod manifest;
mod model;
mod spec;

pub use layout::{
    DESCRIPTOR_FILE, INDEX_FILE, MANIFEST_SUFFIX, PackageLayout, validate_package_name,
};
pub use manifest::{Manifest, PackageDescriptor, Sidecar, SidecarKind};
pub use model::{Group, LATEST_LABEL, Version, VersionInfo, VersionRef};
pub use spec::PackageSpec;
