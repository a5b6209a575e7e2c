use anyhow::{Result, bail};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::runtime::Runtime;
use crate::source::{LocalFolderProvider, PackageSource, SourceRegistry};

mod install;
mod list;
mod resolve;

pub use install::install;
pub use list::list;
pub use resolve::resolve;

/// Source group label given to every folder passed with `--source`.
pub const LOCAL_SOURCE_GROUP: &str = "local";

/// Register one [`LocalFolderProvider`] per folder, named after the folder.
pub fn build_registry<R: Runtime + 'static>(
    runtime: Arc<R>,
    folders: &[PathBuf],
) -> Result<SourceRegistry> {
    if folders.is_empty() {
        bail!("No package source given. Pass at least one --source <DIR>.");
    }

    let mut registry = SourceRegistry::new();
    for folder in folders {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder.display().to_string());
        let provider = LocalFolderProvider::new(Arc::clone(&runtime), folder.clone());
        debug!("Registering source {} from {:?}", name, folder);
        if registry
            .register(PackageSource::new(
                name.clone(),
                LOCAL_SOURCE_GROUP,
                Arc::new(provider),
            ))
            .is_some()
        {
            warn!("Source {} given twice; using {:?}", name, folder);
        }
    }
    Ok(registry)
}
