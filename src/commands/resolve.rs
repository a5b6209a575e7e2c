use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::package::VersionRef;
use crate::runtime::Runtime;
use crate::source::{PackageSource, SourceRegistry};
use crate::store::FsStore;

use super::build_registry;

/// Load and resolve the given sources, printing each version's dependencies
#[tracing::instrument(skip(runtime, config, sources))]
pub async fn resolve<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: &Config,
    sources: &[PathBuf],
) -> Result<()> {
    let store = FsStore::new(Arc::clone(&runtime), config.install_root.clone());
    let mut registry = build_registry(runtime, sources)?;
    registry.load_all(&store, config.resolve_mode).await?;
    print_resolution(&mut std::io::stdout(), &registry)
}

pub(crate) fn print_resolution(out: &mut impl Write, registry: &SourceRegistry) -> Result<()> {
    for source in registry.sources() {
        writeln!(out, "{}:", source.key())?;
        for group in source.groups() {
            for version in &group.versions {
                let dependencies: Vec<String> = version
                    .dependencies()
                    .iter()
                    .map(|d| label(source, *d))
                    .collect();
                write!(out, "  {}@{}", group.name, version.version)?;
                if !dependencies.is_empty() {
                    write!(out, " -> {}", dependencies.join(", "))?;
                }
                if !version.unresolved.is_empty() {
                    write!(out, " (unresolved: {})", version.unresolved.join(", "))?;
                }
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

fn label(source: &PackageSource, at: VersionRef) -> String {
    format!("{}@{}", source.group_of(at).name, source.version(at).version)
}
