use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::source::SourceKey;

/// Label of the version used when a dependency falls back to a whole group.
pub const LATEST_LABEL: &str = "latest";

/// Position of a version inside its source: `groups[group].versions[version]`.
///
/// References stay valid until the owning source is cleared or reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionRef {
    pub group: usize,
    pub version: usize,
}

impl VersionRef {
    pub fn new(group: usize, version: usize) -> Self {
        Self { group, version }
    }
}

/// Version declaration handed to [`Registrar::add_group`](crate::source::Registrar::add_group)
/// by a provider's load callback. Dependencies are raw identifiers, not yet resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(rename = "id")]
    pub dependency_id: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl VersionInfo {
    pub fn new(
        version: impl Into<String>,
        dependency_id: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            version: version.into(),
            dependency_id: dependency_id.into(),
            dependencies,
        }
    }
}

/// A single installable revision of a [`Group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
    /// Globally unique key for this exact revision.
    pub dependency_id: String,
    /// Index of the owning group within its source.
    pub group: usize,
    /// `None` until the source has been resolved.
    #[serde(default)]
    pub dependencies: Option<Vec<VersionRef>>,
    /// Raw identifiers that resolved to nothing (permissive mode only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

impl Version {
    pub fn is_resolved(&self) -> bool {
        self.dependencies.is_some()
    }

    /// Resolved dependencies, or an empty slice before resolution.
    pub fn dependencies(&self) -> &[VersionRef] {
        self.dependencies.as_deref().unwrap_or(&[])
    }
}

/// A named package with one or more versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub author: String,
    /// Also the unique package name and the package directory name.
    pub name: String,
    pub description: String,
    /// Group-level identifier, distinct from the per-version identifiers.
    pub dependency_id: String,
    pub tags: BTreeSet<String>,
    pub versions: Vec<Version>,
    pub source: SourceKey,
}

impl Group {
    /// Identifier written into the package descriptor.
    pub fn package_id(&self) -> String {
        self.dependency_id.to_lowercase()
    }

    pub fn version_index(&self, label: &str) -> Option<usize> {
        self.versions.iter().position(|v| v.version == label)
    }

    /// Index of the version labelled [`LATEST_LABEL`], if the group publishes one.
    pub fn latest_index(&self) -> Option<usize> {
        self.version_index(LATEST_LABEL)
    }
}
