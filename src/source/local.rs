//! Provider backed by a folder on the local file system.
//!
//! ```text
//! <folder>/
//!   index.json                 groups and versions offered by this folder
//!   <name>/<version>/...       unpacked payload, or
//!   <name>/<version>.tar.gz    packed payload
//! ```

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Provider, Registrar};
use crate::package::{Group, INDEX_FILE, Version, VersionInfo};
use crate::runtime::Runtime;

const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(Debug, Deserialize)]
struct FolderIndex {
    #[serde(default)]
    groups: Vec<FolderGroup>,
}

#[derive(Debug, Deserialize)]
struct FolderGroup {
    author: String,
    name: String,
    #[serde(default)]
    description: String,
    id: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    versions: Vec<VersionInfo>,
}

pub struct LocalFolderProvider<R: Runtime> {
    runtime: Arc<R>,
    folder: PathBuf,
}

impl<R: Runtime> LocalFolderProvider<R> {
    pub fn new(runtime: Arc<R>, folder: PathBuf) -> Self {
        Self { runtime, folder }
    }

    fn read_index(&self) -> Result<FolderIndex> {
        let path = self.folder.join(INDEX_FILE);
        let content = self
            .runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read source index {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse source index {:?}", path))
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<()> {
        self.runtime.create_dir_all(to)?;
        for entry in self.runtime.read_dir(from)? {
            let file_name = entry
                .file_name()
                .ok_or_else(|| anyhow!("Invalid payload entry {:?}", entry))?;
            let dest = to.join(file_name);
            if self.runtime.is_dir(&entry) {
                self.copy_tree(&entry, &dest)?;
            } else {
                self.runtime
                    .copy(&entry, &dest)
                    .with_context(|| format!("Failed to copy {:?}", entry))?;
            }
        }
        Ok(())
    }

    fn unpack(&self, archive_path: &Path, to: &Path) -> Result<()> {
        self.runtime.create_dir_all(to)?;
        let reader = self.runtime.open(archive_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        for entry in archive
            .entries()
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?
        {
            let mut entry = entry?;
            // unpack_in refuses entries that would escape the target directory
            if !entry.unpack_in(to)? {
                bail!(
                    "Archive {:?} contains an entry outside the target directory",
                    archive_path
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Runtime + 'static> Provider for LocalFolderProvider<R> {
    #[tracing::instrument(skip(self, registrar), fields(folder = ?self.folder))]
    async fn load(&self, registrar: &mut Registrar) -> Result<()> {
        let index = self.read_index()?;
        debug!("Source index lists {} group(s)", index.groups.len());
        for group in index.groups {
            registrar.add_group(
                &group.author,
                &group.name,
                &group.description,
                &group.id,
                group.tags,
                group.versions,
            )?;
        }
        Ok(())
    }

    /// `Foo-1.2` belongs to group `Foo`; an identifier without a `-` is its own group.
    fn resolve_group_id(&self, raw_dependency_id: &str) -> String {
        raw_dependency_id
            .rsplit_once('-')
            .map(|(group, _)| group)
            .unwrap_or(raw_dependency_id)
            .to_string()
    }

    #[tracing::instrument(skip(self, group, version))]
    async fn materialize_files(
        &self,
        group: &Group,
        version: &Version,
        target_dir: &Path,
    ) -> Result<()> {
        let base = self.folder.join(&group.name);
        let unpacked = base.join(&version.version);
        if self.runtime.is_dir(&unpacked) {
            debug!("Copying payload from {:?}", unpacked);
            return self.copy_tree(&unpacked, target_dir);
        }

        let archive = base.join(format!("{}{}", version.version, ARCHIVE_SUFFIX));
        if self.runtime.exists(&archive) {
            debug!("Unpacking payload from {:?}", archive);
            return self.unpack(&archive, target_dir);
        }

        Err(anyhow!(
            "No payload for {}@{} in {:?}",
            group.name,
            version.version,
            self.folder
        ))
    }
}
