use anyhow::{Result, anyhow};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::error::PkgError;
use crate::install::Installer;
use crate::package::PackageSpec;
use crate::refresh::RefreshScheduler;
use crate::runtime::Runtime;
use crate::store::{FsStore, Store};

use super::build_registry;

/// Install `name[@version]` from the first source that offers it, then wait
/// for the post-install refresh.
#[tracing::instrument(skip(runtime, config, sources))]
pub async fn install<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: &Config,
    sources: &[PathBuf],
    spec_str: &str,
) -> Result<()> {
    let spec = spec_str.parse::<PackageSpec>()?;
    let store = Arc::new(FsStore::new(Arc::clone(&runtime), config.install_root.clone()));

    let mut registry = build_registry(Arc::clone(&runtime), sources)?;
    registry
        .load_all(store.as_ref(), config.resolve_mode)
        .await?;

    let source = registry.find_group(&spec.name).ok_or_else(|| {
        anyhow!(PkgError::GroupNotFound {
            name: spec.name.clone(),
        })
    })?;
    debug!("Installing {} from source {}", spec, source.key());

    let store: Arc<dyn Store> = store;
    let scheduler = RefreshScheduler::new(Arc::clone(&store), config.quiescence);
    let installer = Installer::new(
        runtime.as_ref(),
        config.install_root.clone(),
        store.as_ref(),
        &scheduler,
        config.assembly_extension.clone(),
    );

    let report = installer
        .install(source, &spec.name, spec.version_label())
        .await?;
    for name in &report.installed {
        println!("Installed {}", name);
    }

    scheduler.wait().await;
    Ok(())
}
