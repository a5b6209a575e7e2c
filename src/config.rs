use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use crate::resolver::ResolveMode;
use crate::runtime::Runtime;

pub const DEFAULT_QUIESCENCE: Duration = Duration::from_secs(1);
pub const DEFAULT_ASSEMBLY_EXTENSION: &str = "dll";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub install_root: PathBuf,
    pub resolve_mode: ResolveMode,
    /// How long installs must stay quiet before the store is refreshed.
    pub quiescence: Duration,
    /// Files with this extension get an assembly sidecar after materialization.
    pub assembly_extension: String,
}

impl Config {
    /// Build a config, falling back to [`default_install_root`] when no root is given.
    pub fn new<R: Runtime>(
        runtime: &R,
        install_root: Option<PathBuf>,
        resolve_mode: ResolveMode,
    ) -> Result<Self> {
        let install_root = match install_root {
            Some(path) => path,
            None => default_install_root(runtime)?,
        };
        info!("Using install root: {}", install_root.display());

        Ok(Self {
            install_root,
            resolve_mode,
            quiescence: DEFAULT_QUIESCENCE,
            assembly_extension: DEFAULT_ASSEMBLY_EXTENSION.to_string(),
        })
    }
}

/// Get the default installation root directory
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".pkgi"))
    }
}

#[cfg(target_os = "macos")]
fn system_install_root() -> PathBuf {
    PathBuf::from("/opt/pkgi")
}

#[cfg(target_os = "windows")]
fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\pkgi")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/pkgi")
}
