//! Package sources.
//!
//! A [`PackageSource`] owns the groups produced by its [`Provider`] and keeps
//! them resolved. Providers are the pluggable part: they enumerate groups,
//! map raw dependency identifiers to group identifiers, and materialize a
//! version's payload into a directory.

mod local;
mod registrar;
mod registry;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::PkgError;
use crate::package::{Group, Version, VersionRef};
use crate::resolver::{ResolveMode, resolve};
use crate::store::Store;

pub use local::LocalFolderProvider;
pub use registrar::{RawDependencies, Registrar};
pub use registry::SourceRegistry;

/// Structural identity of a source: equal name and source group means the same source,
/// regardless of which object instance carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct SourceKey {
    pub name: String,
    /// Label clustering several sources behind one logical feed.
    pub source_group: String,
}

impl SourceKey {
    pub fn new(name: impl Into<String>, source_group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_group: source_group.into(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_group, self.name)
    }
}

/// Callback contract implemented by every concrete package provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Register this provider's groups by calling [`Registrar::add_group`] zero or more times.
    async fn load(&self, registrar: &mut Registrar) -> Result<()>;

    /// Map a raw dependency identifier to the identifier of the group it belongs to.
    fn resolve_group_id(&self, raw_dependency_id: &str) -> String;

    /// Populate `target_dir` with the payload of `version`.
    async fn materialize_files(
        &self,
        group: &Group,
        version: &Version,
        target_dir: &Path,
    ) -> Result<()>;
}

/// Serializable snapshot of a source, persisted by a [`Store`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub source_group: String,
    /// Seconds since the Unix epoch of the last completed load.
    pub last_update_time: Option<u64>,
    pub groups: Vec<Group>,
}

pub struct PackageSource {
    key: SourceKey,
    provider: Arc<dyn Provider>,
    groups: Vec<Group>,
    last_update_time: Option<SystemTime>,
}

impl PackageSource {
    pub fn new(
        name: impl Into<String>,
        source_group: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            key: SourceKey::new(name, source_group),
            provider,
            groups: Vec::new(),
            last_update_time: None,
        }
    }

    pub fn key(&self) -> &SourceKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn source_group(&self) -> &str {
        &self.key.source_group
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn last_update_time(&self) -> Option<SystemTime> {
        self.last_update_time
    }

    /// Drop every group (and with them every version) owned by this source.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Full rebuild: clear, run the provider's load callback, persist, resolve, persist again.
    ///
    /// If the load callback fails the source is left empty.
    #[tracing::instrument(skip(self, store), fields(source = %self.key))]
    pub async fn load_packages(&mut self, store: &dyn Store, mode: ResolveMode) -> Result<()> {
        self.clear();

        let mut registrar = Registrar::new(self.key.clone());
        self.provider
            .load(&mut registrar)
            .await
            .map_err(|e| {
                e.context(PkgError::LoadFailure {
                    source_name: self.key.name.clone(),
                })
            })?;

        let (groups, raw_dependencies) = registrar.into_parts();
        self.groups = groups;
        store.save(self)?;

        resolve(
            &mut self.groups,
            &raw_dependencies,
            self.provider.as_ref(),
            mode,
        )?;
        self.last_update_time = Some(SystemTime::now());
        store.save(self)?;

        info!(
            "Loaded {} package(s) from source {}",
            self.groups.len(),
            self.key
        );
        Ok(())
    }

    /// Replace the groups with a previously persisted snapshot.
    pub fn restore(&mut self, catalog: Catalog) {
        self.groups = catalog.groups;
        self.last_update_time = catalog
            .last_update_time
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
    }

    /// Look up a group by its package name.
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    pub fn group_of(&self, version: VersionRef) -> &Group {
        &self.groups[version.group]
    }

    pub fn version(&self, version: VersionRef) -> &Version {
        &self.groups[version.group].versions[version.version]
    }

    /// Locate `name@label`, failing with [`PkgError::GroupNotFound`] or [`PkgError::VersionNotFound`].
    pub fn find_version(&self, name: &str, label: &str) -> Result<VersionRef> {
        let group = self.group_index(name).ok_or_else(|| {
            anyhow!(PkgError::GroupNotFound {
                name: name.to_string(),
            })
        })?;
        let version = self.groups[group].version_index(label).ok_or_else(|| {
            anyhow!(PkgError::VersionNotFound {
                group: name.to_string(),
                version: label.to_string(),
            })
        })?;
        Ok(VersionRef::new(group, version))
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            name: self.key.name.clone(),
            source_group: self.key.source_group.clone(),
            last_update_time: self
                .last_update_time
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
            groups: self.groups.clone(),
        }
    }
}

impl PartialEq for PackageSource {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PackageSource {}

impl Hash for PackageSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageSource")
            .field("key", &self.key)
            .field("groups", &self.groups.len())
            .field("last_update_time", &self.last_update_time)
            .finish()
    }
}

/// Turn a source name or group label into a portable path component.
pub(crate) fn sanitize_component(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.starts_with('.') {
        format!("_{}", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::VersionInfo;
    use crate::store::MockStore;
    use crate::test_utils::{mock_provider, sample_group};
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn permissive_store() -> MockStore {
        let mut store = MockStore::new();
        store.expect_save().returning(|_| Ok(()));
        store
    }

    #[test]
    fn test_sources_with_same_key_are_equal() {
        let a = PackageSource::new("feed", "registry", Arc::new(MockProvider::new()));
        let b = PackageSource::new("feed", "registry", Arc::new(MockProvider::new()));
        let c = PackageSource::new("feed", "mirror", Arc::new(MockProvider::new()));

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
        assert_eq!(hash_of(a.key()), hash_of(b.key()));
    }

    #[test]
    fn test_source_key_display() {
        assert_eq!(SourceKey::new("feed", "registry").to_string(), "registry/feed");
    }

    #[tokio::test]
    async fn test_load_packages_persists_twice_and_resolves() {
        let provider = mock_provider(vec![
            ("A", vec![VersionInfo::new("1.0", "A-1.0", vec![])]),
            (
                "B",
                vec![VersionInfo::new("2.0", "B-2.0", vec!["A-1.0".into()])],
            ),
        ]);
        let mut source = PackageSource::new("local", "default", Arc::new(provider));

        let mut store = MockStore::new();
        let mut saves = 0;
        store.expect_save().times(2).returning(move |s: &PackageSource| {
            saves += 1;
            // first save happens before resolution, second after
            assert_eq!(s.groups()[1].versions[0].is_resolved(), saves == 2);
            Ok(())
        });

        source
            .load_packages(&store, ResolveMode::Permissive)
            .await
            .unwrap();

        let b = source.find_version("B", "2.0").unwrap();
        assert_eq!(
            source.version(b).dependencies(),
            &[VersionRef::new(0, 0)]
        );
        assert!(source.last_update_time().is_some());
    }

    #[tokio::test]
    async fn test_load_packages_replaces_previous_groups() {
        let provider = mock_provider(vec![(
            "A",
            vec![VersionInfo::new("1.0", "A-1.0", vec![])],
        )]);
        let mut source = PackageSource::new("local", "default", Arc::new(provider));
        let store = permissive_store();

        source.load_packages(&store, ResolveMode::Permissive).await.unwrap();
        source.load_packages(&store, ResolveMode::Permissive).await.unwrap();

        assert_eq!(source.groups().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_yields_identical_groups() {
        let provider = mock_provider(vec![
            (
                "A",
                vec![
                    VersionInfo::new("1.0", "A-1.0", vec![]),
                    VersionInfo::new("latest", "A-latest", vec![]),
                ],
            ),
            (
                "B",
                vec![VersionInfo::new(
                    "2.0",
                    "B-2.0",
                    vec!["A-1.0".into(), "A".into(), "Missing-1.0".into()],
                )],
            ),
        ]);
        let mut source = PackageSource::new("local", "default", Arc::new(provider));
        let store = permissive_store();

        source.load_packages(&store, ResolveMode::Permissive).await.unwrap();
        let first = source.groups().to_vec();
        source.load_packages(&store, ResolveMode::Permissive).await.unwrap();

        assert_eq!(source.groups(), first.as_slice());
        let b = source.find_version("B", "2.0").unwrap();
        assert_eq!(
            source.version(b).dependencies(),
            &[VersionRef::new(0, 0), VersionRef::new(0, 1)]
        );
        assert_eq!(source.version(b).unresolved, vec!["Missing-1.0"]);
    }

    #[test]
    fn test_restore_from_catalog() {
        let mut source = PackageSource::new("local", "default", Arc::new(MockProvider::new()));
        source.restore(Catalog {
            name: "local".into(),
            source_group: "default".into(),
            last_update_time: Some(1_700_000_000),
            groups: vec![sample_group("A", &[VersionInfo::new("1.0", "A-1.0", vec![])])],
        });

        assert_eq!(source.groups().len(), 1);
        assert_eq!(source.catalog().last_update_time, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_load_failure_leaves_source_empty() {
        let mut provider = MockProvider::new();
        let mut calls = 0;
        provider.expect_load().returning(move |registrar: &mut Registrar| {
            calls += 1;
            if calls == 1 {
                registrar.add_group("acme", "A", "", "A", Vec::<String>::new(), vec![
                    VersionInfo::new("1.0", "A-1.0", vec![]),
                ])
            } else {
                Err(anyhow!("index unreachable"))
            }
        });
        provider.expect_resolve_group_id().returning(|raw| raw.to_string());
        let mut source = PackageSource::new("local", "default", Arc::new(provider));
        let store = permissive_store();

        source.load_packages(&store, ResolveMode::Permissive).await.unwrap();
        assert_eq!(source.groups().len(), 1);

        let err = source
            .load_packages(&store, ResolveMode::Permissive)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PkgError>(),
            Some(&PkgError::LoadFailure {
                source_name: "local".into()
            })
        );
        assert!(source.groups().is_empty());
    }

    #[tokio::test]
    async fn test_find_version_errors() {
        let provider = mock_provider(vec![(
            "A",
            vec![VersionInfo::new("1.0", "A-1.0", vec![])],
        )]);
        let mut source = PackageSource::new("local", "default", Arc::new(provider));
        source
            .load_packages(&permissive_store(), ResolveMode::Permissive)
            .await
            .unwrap();

        let err = source.find_version("Z", "1.0").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PkgError>(),
            Some(PkgError::GroupNotFound { .. })
        ));

        let err = source.find_version("A", "9.9").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PkgError>(),
            Some(PkgError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_catalog_snapshot() {
        let source = PackageSource::new("local", "default", Arc::new(MockProvider::new()));
        let catalog = source.catalog();
        assert_eq!(catalog.name, "local");
        assert_eq!(catalog.source_group, "default");
        assert_eq!(catalog.last_update_time, None);
        assert!(catalog.groups.is_empty());
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("my feed/v2"), "my_feed_v2");
        assert_eq!(sanitize_component(".."), "_..");
        assert_eq!(sanitize_component(""), "_");
    }
}
