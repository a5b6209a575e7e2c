//! Persistence boundary for sources and installed packages.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::package::{MANIFEST_SUFFIX, PackageDescriptor, PackageLayout};
use crate::runtime::Runtime;
use crate::source::{Catalog, PackageSource, SourceKey, sanitize_component};

#[cfg_attr(test, mockall::automock)]
pub trait Store: Send + Sync {
    /// Persist a snapshot of `source`.
    fn save(&self, source: &PackageSource) -> Result<()>;

    /// Snapshot previously saved for `key`, if any.
    fn load_catalog(&self, key: &SourceKey) -> Result<Option<Catalog>>;

    /// Every committed package manifest under the install root.
    fn find_manifests(&self) -> Result<Vec<PathBuf>>;

    /// Rebuild derived data (the installed package index) after installs.
    fn refresh(&self) -> Result<()>;
}

/// `index.json` at the install root.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PackageIndex {
    pub packages: Vec<PackageDescriptor>,
}

/// [`Store`] keeping everything as JSON files under the install root.
pub struct FsStore<R: Runtime> {
    runtime: Arc<R>,
    install_root: PathBuf,
}

impl<R: Runtime> FsStore<R> {
    pub fn new(runtime: Arc<R>, install_root: PathBuf) -> Self {
        Self {
            runtime,
            install_root,
        }
    }

    fn layout(&self) -> PackageLayout<'_, R> {
        PackageLayout::new(self.runtime.as_ref(), self.install_root.clone())
    }

    /// Returns: `<install_root>/.catalog/<source_group>/<name>.json`
    pub fn catalog_path(&self, key: &SourceKey) -> PathBuf {
        self.layout()
            .catalog_root()
            .join(sanitize_component(&key.source_group))
            .join(format!("{}.json", sanitize_component(&key.name)))
    }

    /// Read `index.json`; a missing index means nothing has been indexed yet.
    pub fn load_index(&self) -> Result<PackageIndex> {
        let path = self.layout().index_path();
        if !self.runtime.exists(&path) {
            return Ok(PackageIndex::default());
        }
        let content = self.runtime.read_to_string(&path)?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse index {:?}", path))
    }

    fn is_hidden_under_root(&self, path: &Path) -> bool {
        path.strip_prefix(&self.install_root)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            .unwrap_or(true)
    }
}

impl<R: Runtime> Store for FsStore<R> {
    #[tracing::instrument(skip(self, source), fields(source = %source.key()))]
    fn save(&self, source: &PackageSource) -> Result<()> {
        let path = self.catalog_path(source.key());
        if let Some(parent) = path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&source.catalog())?;
        self.runtime
            .write(&path, content.as_bytes())
            .with_context(|| format!("Failed to save catalog to {:?}", path))?;
        debug!("Saved catalog for {} to {:?}", source.key(), path);
        Ok(())
    }

    fn load_catalog(&self, key: &SourceKey) -> Result<Option<Catalog>> {
        let path = self.catalog_path(key);
        if !self.runtime.exists(&path) {
            return Ok(None);
        }
        let content = self.runtime.read_to_string(&path)?;
        let catalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {:?}", path))?;
        Ok(Some(catalog))
    }

    fn find_manifests(&self) -> Result<Vec<PathBuf>> {
        let manifests = self
            .runtime
            .find_files(&self.install_root, "json")?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
            })
            .filter(|p| !self.is_hidden_under_root(p))
            .collect();
        Ok(manifests)
    }

    #[tracing::instrument(skip(self))]
    fn refresh(&self) -> Result<()> {
        let layout = self.layout();
        let mut index = PackageIndex::default();
        for name in layout.installed_packages()? {
            let path = layout.descriptor_path(&name);
            if !self.runtime.exists(&path) {
                debug!("Skipping {}: no package descriptor", name);
                continue;
            }
            index
                .packages
                .push(PackageDescriptor::load(self.runtime.as_ref(), &path)?);
        }

        let content = serde_json::to_string_pretty(&index)?;
        self.runtime.create_dir_all(&self.install_root)?;
        self.runtime
            .write(&layout.index_path(), content.as_bytes())
            .context("Failed to write package index")?;
        info!("Indexed {} installed package(s)", index.packages.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::source::MockProvider;
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn fs_store(root: &Path) -> FsStore<RealRuntime> {
        FsStore::new(Arc::new(RealRuntime), root.to_path_buf())
    }

    fn write_descriptor(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let descriptor = PackageDescriptor {
            id: name.to_lowercase(),
            name: name.to_string(),
            author: "acme".into(),
            version: "1.0".into(),
            description: String::new(),
        };
        fs::write(
            dir.join("package.json"),
            serde_json::to_string(&descriptor).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_catalog_path_is_sanitized() {
        let store = FsStore::new(Arc::new(MockRuntime::new()), PathBuf::from("/root"));
        assert_eq!(
            store.catalog_path(&SourceKey::new("my feed", "remote")),
            PathBuf::from("/root/.catalog/remote/my_feed.json")
        );
    }

    #[test]
    fn test_save_then_load_catalog() {
        let dir = tempdir().unwrap();
        let store = fs_store(dir.path());
        let source = PackageSource::new("local", "default", Arc::new(MockProvider::new()));

        store.save(&source).unwrap();

        let catalog = store.load_catalog(source.key()).unwrap().unwrap();
        assert_eq!(catalog, source.catalog());
        assert!(
            store
                .load_catalog(&SourceKey::new("other", "default"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_find_manifests_skips_staging_and_other_json() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "alpha/alpha.manifest.json",
            "beta/nested/beta.manifest.json",
            ".staging/gamma/gamma.manifest.json",
            "alpha/package.json",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "{}").unwrap();
        }

        let found = fs_store(root).find_manifests().unwrap();

        assert_eq!(
            found,
            vec![
                root.join("alpha/alpha.manifest.json"),
                root.join("beta/nested/beta.manifest.json"),
            ]
        );
    }

    #[test]
    fn test_find_manifests_missing_root() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_find_files()
            .with(eq(PathBuf::from("/missing")), eq("json"))
            .returning(|_, _| Ok(vec![]));

        let store = FsStore::new(Arc::new(runtime), PathBuf::from("/missing"));
        assert!(store.find_manifests().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_indexes_installed_packages() {
        let dir = tempdir().unwrap();
        write_descriptor(dir.path(), "beta");
        write_descriptor(dir.path(), "alpha");
        fs::create_dir_all(dir.path().join("no-descriptor")).unwrap();
        fs::create_dir_all(dir.path().join(".staging/alpha")).unwrap();

        let store = fs_store(dir.path());
        store.refresh().unwrap();

        let names: Vec<_> = store
            .load_index()
            .unwrap()
            .packages
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_load_index_missing() {
        let dir = tempdir().unwrap();
        assert!(fs_store(dir.path()).load_index().unwrap().packages.is_empty());
    }
}
