use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::{Group, Version};

/// Identity and dependency links of an installed package.
///
/// `dependencies` holds manifest references: paths relative to the install
/// root, e.g. `"alpha/alpha.manifest.json"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    pub author: String,
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Manifest {
    /// Identity-only manifest; dependencies are wired later.
    pub fn from_group(group: &Group, version: &Version) -> Self {
        Manifest {
            author: group.author.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
            version: version.version.clone(),
            dependencies: vec![],
        }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {:?}", path))
    }

    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Failed to save manifest to {:?}", path))
    }
}

/// `package.json` written next to the manifest of every installed package.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub id: String,
    pub name: String,
    pub author: String,
    pub version: String,
    pub description: String,
}

impl PackageDescriptor {
    pub fn from_group(group: &Group, version: &Version) -> Self {
        PackageDescriptor {
            id: group.package_id(),
            name: group.name.clone(),
            author: group.author.clone(),
            version: version.version.clone(),
            description: group.description.clone(),
        }
    }

    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse package descriptor {:?}", path))
    }

    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Failed to save package descriptor to {:?}", path))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SidecarKind {
    Assembly,
    Manifest,
}

/// Metadata sidecar stored as `<file>.meta` beside an asset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Sidecar {
    pub asset: String,
    pub kind: SidecarKind,
}

impl Sidecar {
    pub const EXTENSION: &'static str = "meta";

    /// Path of the sidecar belonging to `asset`.
    pub fn path_for(asset: &Path) -> PathBuf {
        let mut name = asset.as_os_str().to_owned();
        name.push(OsString::from(format!(".{}", Self::EXTENSION)));
        PathBuf::from(name)
    }

    /// Write (or overwrite) the sidecar for `asset` and return its path.
    pub fn write_for<R: Runtime>(runtime: &R, asset: &Path, kind: SidecarKind) -> Result<PathBuf> {
        let sidecar = Sidecar {
            asset: asset
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind,
        };
        let path = Self::path_for(asset);
        let content = serde_json::to_string_pretty(&sidecar)?;
        runtime
            .write(&path, content.as_bytes())
            .with_context(|| format!("Failed to write sidecar {:?}", path))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::VersionInfo;
    use crate::runtime::MockRuntime;
    use crate::test_utils::sample_group;
    use mockall::predicate::eq;

    #[test]
    fn test_manifest_from_group_copies_identity() {
        let group = sample_group("Alpha", &[VersionInfo::new("1.0", "Alpha-1.0", vec![])]);
        let manifest = Manifest::from_group(&group, &group.versions[0]);

        assert_eq!(manifest.author, "acme");
        assert_eq!(manifest.name, "Alpha");
        assert_eq!(manifest.description, "Alpha package");
        assert_eq!(manifest.version, "1.0");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_manifest_load_defaults_missing_dependencies() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/root/alpha/alpha.manifest.json");

        runtime
            .expect_read_to_string()
            .with(eq(path.clone()))
            .returning(|_| {
                Ok(r#"{"author":"a","name":"alpha","description":"d","version":"1.0"}"#.into())
            });

        let manifest = Manifest::load(&runtime, &path).unwrap();
        assert_eq!(manifest.name, "alpha");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_manifest_load_invalid_json() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("not json".into()));

        let err = Manifest::load(&runtime, Path::new("/root/x.manifest.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse manifest"));
    }

    #[test]
    fn test_descriptor_uses_lowercased_group_id() {
        let mut group = sample_group("Alpha", &[VersionInfo::new("1.0", "Alpha-1.0", vec![])]);
        group.dependency_id = "Acme.Alpha".into();
        let descriptor = PackageDescriptor::from_group(&group, &group.versions[0]);

        assert_eq!(descriptor.id, "acme.alpha");
        assert_eq!(descriptor.name, "Alpha");
        assert_eq!(descriptor.version, "1.0");
    }

    #[test]
    fn test_sidecar_path_appends_extension() {
        assert_eq!(
            Sidecar::path_for(Path::new("/root/alpha/Core.dll")),
            PathBuf::from("/root/alpha/Core.dll.meta")
        );
    }

    #[test]
    fn test_sidecar_write_for() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .withf(|path, contents| {
                let text = std::str::from_utf8(contents).unwrap();
                path == Path::new("/root/alpha/Core.dll.meta")
                    && text.contains("\"asset\": \"Core.dll\"")
                    && text.contains("\"kind\": \"assembly\"")
            })
            .returning(|_, _| Ok(()));

        let path =
            Sidecar::write_for(&runtime, Path::new("/root/alpha/Core.dll"), SidecarKind::Assembly)
                .unwrap();
        assert_eq!(path, PathBuf::from("/root/alpha/Core.dll.meta"));
    }
}
