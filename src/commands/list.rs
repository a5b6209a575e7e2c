use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::package::PackageLayout;
use crate::runtime::Runtime;
use crate::source::SourceRegistry;
use crate::store::FsStore;

use super::build_registry;

/// List every package offered by the given sources and whether it is installed.
///
/// A source that cannot be read is listed from its cached catalog.
#[tracing::instrument(skip(runtime, config, sources))]
pub async fn list<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: &Config,
    sources: &[PathBuf],
) -> Result<()> {
    let store = FsStore::new(Arc::clone(&runtime), config.install_root.clone());
    let mut registry = build_registry(Arc::clone(&runtime), sources)?;
    registry
        .load_all_or_cached(&store, config.resolve_mode)
        .await?;

    let layout = PackageLayout::new(runtime.as_ref(), config.install_root.clone());
    print_packages(&mut std::io::stdout(), &registry, &layout)
}

pub(crate) fn print_packages<R: Runtime>(
    out: &mut impl Write,
    registry: &SourceRegistry,
    layout: &PackageLayout<'_, R>,
) -> Result<()> {
    if registry.sources().iter().all(|s| s.groups().is_empty()) {
        writeln!(out, "No packages available.")?;
        return Ok(());
    }

    for source in registry.sources() {
        writeln!(out, "{}:", source.key())?;
        for group in source.groups() {
            let versions: Vec<&str> = group.versions.iter().map(|v| v.version.as_str()).collect();
            let marker = if layout.is_installed(&group.name) {
                " [installed]"
            } else {
                ""
            };
            writeln!(out, "  {} ({}){}", group.name, versions.join(", "), marker)?;
        }
    }
    Ok(())
}
