//! Source registry for managing multiple package sources.
//!
//! Sources are indexed by their structural [`SourceKey`], so a reloaded source
//! object replaces its earlier instance instead of being added twice.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::warn;

use super::{PackageSource, SourceKey};
use crate::error::PkgError;
use crate::resolver::ResolveMode;
use crate::store::Store;

/// Registry of package sources, kept in registration order.
///
/// The registry allows:
/// - Registering sources (replacing any source with an equal key)
/// - Listing sources clustered under one source group
/// - Loading and resolving every source
/// - Finding which source provides a package
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<PackageSource>,
    index: HashMap<SourceKey, usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source.
    ///
    /// If a source with the same key is already registered it is replaced in
    /// place and returned.
    pub fn register(&mut self, source: PackageSource) -> Option<PackageSource> {
        match self.index.get(source.key()) {
            Some(&i) => Some(std::mem::replace(&mut self.sources[i], source)),
            None => {
                self.index.insert(source.key().clone(), self.sources.len());
                self.sources.push(source);
                None
            }
        }
    }

    pub fn get(&self, key: &SourceKey) -> Option<&PackageSource> {
        self.index.get(key).map(|&i| &self.sources[i])
    }

    pub fn has(&self, key: &SourceKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[PackageSource] {
        &self.sources
    }

    /// All sources sharing the given source group label.
    pub fn by_source_group(&self, source_group: &str) -> Vec<&PackageSource> {
        self.sources
            .iter()
            .filter(|s| s.source_group() == source_group)
            .collect()
    }

    /// Run `load_packages` on every source in registration order, stopping at the first failure.
    pub async fn load_all(&mut self, store: &dyn Store, mode: ResolveMode) -> Result<()> {
        for source in &mut self.sources {
            let key = source.key().clone();
            source
                .load_packages(store, mode)
                .await
                .with_context(|| format!("Failed to load source {}", key))?;
        }
        Ok(())
    }

    /// Like [`load_all`](Self::load_all), but a source whose provider cannot be
    /// loaded falls back to the catalog the store persisted for it.
    pub async fn load_all_or_cached(&mut self, store: &dyn Store, mode: ResolveMode) -> Result<()> {
        for source in &mut self.sources {
            let key = source.key().clone();
            let Err(e) = source.load_packages(store, mode).await else {
                continue;
            };
            let load_failed = matches!(
                e.downcast_ref::<PkgError>(),
                Some(PkgError::LoadFailure { .. })
            );
            match store.load_catalog(&key)? {
                Some(catalog) if load_failed => {
                    warn!("Source {} is unavailable ({:#}); using cached catalog", key, e);
                    source.restore(catalog);
                }
                _ => return Err(e.context(format!("Failed to load source {}", key))),
            }
        }
        Ok(())
    }

    /// First source (in registration order) that provides a package named `name`.
    pub fn find_group(&self, name: &str) -> Option<&PackageSource> {
        self.sources
            .iter()
            .find(|s| s.group_index(name).is_some())
    }
}
