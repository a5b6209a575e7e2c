//! Three-phase package installation.
//!
//! 1. Materialize: recreate each package directory, let the provider fill it,
//!    and tag every assembly with a sidecar.
//! 2. Stage: write identity-only manifests under the staging root.
//! 3. Wire and commit: point each staged manifest at its dependencies'
//!    manifests, move it into the package directory, write the descriptor.
//!
//! Every phase finishes for the whole install set before the next one starts.

mod closure;

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::PkgError;
use crate::package::{
    Manifest, PackageDescriptor, PackageLayout, Sidecar, SidecarKind, VersionRef,
};
use crate::refresh::Refresh;
use crate::runtime::{Runtime, manifest_reference};
use crate::source::PackageSource;
use crate::store::Store;

pub use closure::compute_install_set;

/// Outcome of one [`Installer::install`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstallReport {
    /// Package names in installation order, dependencies first.
    pub installed: Vec<String>,
}

pub struct Installer<'a, R: Runtime> {
    runtime: &'a R,
    layout: PackageLayout<'a, R>,
    store: &'a dyn Store,
    refresh: &'a dyn Refresh,
    assembly_extension: String,
}

impl<'a, R: Runtime> Installer<'a, R> {
    pub fn new(
        runtime: &'a R,
        install_root: PathBuf,
        store: &'a dyn Store,
        refresh: &'a dyn Refresh,
        assembly_extension: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            layout: PackageLayout::new(runtime, install_root),
            store,
            refresh,
            assembly_extension: assembly_extension.into(),
        }
    }

    pub fn layout(&self) -> &PackageLayout<'a, R> {
        &self.layout
    }

    /// Install `name@label` from `source` together with its missing dependencies.
    ///
    /// The target itself is always reinstalled; dependencies with a committed
    /// manifest or descriptor are left alone.
    #[tracing::instrument(skip(self, source), fields(source = %source.key()))]
    pub async fn install(
        &self,
        source: &PackageSource,
        name: &str,
        label: &str,
    ) -> Result<InstallReport> {
        let target = source.find_version(name, label)?;
        let mut installables = compute_install_set(source, &self.layout, target)?;
        installables.retain(|v| v.group != target.group);
        installables.push(target);

        debug!(
            "Install set for {}@{}: {:?}",
            name,
            label,
            installables
                .iter()
                .map(|v| &source.version(*v).dependency_id)
                .collect::<Vec<_>>()
        );

        self.discard_stale_staging()?;

        for &at in &installables {
            self.materialize(source, at).await?;
        }
        for &at in &installables {
            self.stage_manifest(source, at)?;
        }
        for &at in &installables {
            self.wire_dependencies(source, at)?;
        }
        for &at in &installables {
            self.commit(source, at)?;
        }
        self.runtime
            .remove_dir_all(&self.layout.staging_root())
            .context("Failed to remove staging area")?;

        self.refresh.schedule();

        let installed: Vec<String> = installables
            .iter()
            .map(|v| source.group_of(*v).name.clone())
            .collect();
        info!("Installed {} package(s): {}", installed.len(), installed.join(", "));
        Ok(InstallReport { installed })
    }

    /// A staging root left behind by an interrupted install is never resumed.
    fn discard_stale_staging(&self) -> Result<()> {
        let staging = self.layout.staging_root();
        if self.runtime.exists(&staging) {
            warn!("Removing stale staging area {:?}", staging);
            self.runtime.remove_dir_all(&staging)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, source))]
    async fn materialize(&self, source: &PackageSource, at: VersionRef) -> Result<()> {
        let group = source.group_of(at);
        let version = source.version(at);
        let dir = self.layout.package_dir(&group.name);

        if self.runtime.exists(&dir) {
            debug!("Replacing existing package directory {:?}", dir);
            self.runtime.remove_dir_all(&dir)?;
        }
        self.runtime.create_dir_all(&dir)?;

        source
            .provider()
            .materialize_files(group, version, &dir)
            .await
            .with_context(|| {
                format!("Failed to materialize {}@{}", group.name, version.version)
            })?;

        let assemblies = self.runtime.find_files(&dir, &self.assembly_extension)?;
        for assembly in &assemblies {
            Sidecar::write_for(self.runtime, assembly, SidecarKind::Assembly)?;
        }
        debug!(
            "Materialized {}@{} with {} assembly file(s)",
            group.name,
            version.version,
            assemblies.len()
        );
        Ok(())
    }

    fn stage_manifest(&self, source: &PackageSource, at: VersionRef) -> Result<()> {
        let group = source.group_of(at);
        let path = self.layout.staged_manifest_path(&group.name);
        if let Some(parent) = path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        Manifest::from_group(group, source.version(at)).save(self.runtime, &path)
    }

    fn wire_dependencies(&self, source: &PackageSource, at: VersionRef) -> Result<()> {
        let group = source.group_of(at);
        let path = self.layout.staged_manifest_path(&group.name);
        let mut manifest = Manifest::load(self.runtime, &path)?;

        // two versions of one group resolve to the same package manifest
        let mut references: Vec<String> = Vec::new();
        for dependency in source.version(at).dependencies() {
            let dependency_name = &source.group_of(*dependency).name;
            let target = self.locate_manifest(dependency_name)?;
            let reference =
                manifest_reference(self.layout.install_root(), &target).ok_or_else(|| {
                    anyhow!(
                        "Manifest {:?} of {} lies outside the install root",
                        target,
                        dependency_name
                    )
                })?;
            if !references.contains(&reference) {
                references.push(reference);
            }
        }
        manifest.dependencies = references;

        manifest.save(self.runtime, &path)
    }

    /// Final location of the manifest for package `name`.
    ///
    /// Looked up in order: a manifest staged by this install, a manifest
    /// already committed to the package directory, any manifest the store
    /// knows about for that package.
    fn locate_manifest(&self, name: &str) -> Result<PathBuf> {
        if self.runtime.exists(&self.layout.staged_manifest_path(name)) {
            return Ok(self.layout.manifest_path(name));
        }

        let installed = self.layout.manifest_path(name);
        if self.runtime.exists(&installed) {
            return Ok(installed);
        }

        let file_name = installed.file_name();
        self.store
            .find_manifests()?
            .into_iter()
            .find(|p| p.file_name() == file_name)
            .ok_or_else(|| {
                PkgError::ManifestNotFound {
                    package: name.to_string(),
                }
                .into()
            })
    }

    fn commit(&self, source: &PackageSource, at: VersionRef) -> Result<()> {
        let group = source.group_of(at);
        let staged = self.layout.staged_manifest_path(&group.name);
        let manifest = self.layout.manifest_path(&group.name);

        self.move_file(&staged, &manifest)?;
        Sidecar::write_for(self.runtime, &manifest, SidecarKind::Manifest)?;
        PackageDescriptor::from_group(group, source.version(at))
            .save(self.runtime, &self.layout.descriptor_path(&group.name))?;
        debug!("Committed manifest for {}", group.name);
        Ok(())
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if self.runtime.exists(to) {
            self.runtime.remove_file(to)?;
        }
        if let Err(e) = self.runtime.rename(from, to) {
            debug!("Rename {:?} -> {:?} failed ({}); copying instead", from, to, e);
            self.runtime
                .copy(from, to)
                .with_context(|| format!("Failed to commit {:?}", to))?;
            self.runtime.remove_file(from)?;
        }
        Ok(())
    }
}
