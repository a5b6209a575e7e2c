//! Domain errors raised while loading, resolving and installing packages.
//!
//! File system failures are not listed here: they surface as plain
//! `anyhow::Error`s from the [`Runtime`](crate::runtime::Runtime) layer.
//! Every variant below travels inside an `anyhow::Error` and can be
//! recovered with `downcast_ref::<PkgError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PkgError {
    /// A provider's load callback failed; the source is left without groups.
    #[error("Failed to load packages from source '{source_name}'")]
    LoadFailure { source_name: String },

    /// A raw dependency identifier matched neither a version nor a group fallback.
    #[error("Version '{version}' depends on '{dependency}', which matches no known version or group")]
    UnresolvedDependency { version: String, dependency: String },

    /// No staged, installed or indexed manifest exists for a dependency.
    #[error("Manifest for package '{package}' not found")]
    ManifestNotFound { package: String },

    /// The dependency graph reachable from the install target contains a cycle.
    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("Package '{name}' not found")]
    GroupNotFound { name: String },

    #[error("Version '{version}' not found for package '{group}'")]
    VersionNotFound { group: String, version: String },
}
