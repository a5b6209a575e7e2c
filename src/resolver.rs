//! Dependency resolution for a freshly loaded source.
//!
//! Every raw dependency identifier is resolved independently:
//!
//! 1. exact match against the dependency id of any version in the source;
//! 2. otherwise the provider maps the identifier to a group id, and the
//!    group's `latest` version is used;
//! 3. otherwise the dependency is unresolved. [`ResolveMode`] decides whether
//!    that is an error or a logged, recorded gap.

use anyhow::Result;
use log::{debug, warn};
use std::collections::HashMap;

use crate::error::PkgError;
use crate::package::{Group, LATEST_LABEL, VersionRef};
use crate::source::{Provider, RawDependencies};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Unresolvable identifiers fail the whole resolution.
    Strict,
    /// Unresolvable identifiers are skipped and recorded on the version.
    #[default]
    Permissive,
}

/// Lookup tables built once per resolution pass.
struct Index {
    versions: HashMap<String, VersionRef>,
    groups: HashMap<String, usize>,
}

impl Index {
    fn build(groups: &[Group]) -> Self {
        let mut versions = HashMap::new();
        let mut by_group = HashMap::new();
        for (g, group) in groups.iter().enumerate() {
            by_group.insert(group.dependency_id.clone(), g);
            for (v, version) in group.versions.iter().enumerate() {
                versions.insert(version.dependency_id.clone(), VersionRef::new(g, v));
            }
        }
        Self {
            versions,
            groups: by_group,
        }
    }

    fn lookup(&self, groups: &[Group], provider: &dyn Provider, raw: &str) -> Option<VersionRef> {
        if let Some(exact) = self.versions.get(raw) {
            return Some(*exact);
        }

        let group_id = provider.resolve_group_id(raw);
        let g = *self.groups.get(&group_id)?;
        let v = groups[g].latest_index()?;
        debug!(
            "Dependency '{}' resolved to {}@{} via group fallback",
            raw, groups[g].name, LATEST_LABEL
        );
        Some(VersionRef::new(g, v))
    }
}

/// Resolve every version's raw dependency identifiers into [`VersionRef`]s.
///
/// Groups are visited in registration order, versions in declaration order.
/// Nothing is written back unless the whole pass succeeds.
pub fn resolve(
    groups: &mut [Group],
    raw_dependencies: &RawDependencies,
    provider: &dyn Provider,
    mode: ResolveMode,
) -> Result<()> {
    let index = Index::build(groups);
    let mut resolved = Vec::new();

    for (g, group) in groups.iter().enumerate() {
        for (v, version) in group.versions.iter().enumerate() {
            let mut dependencies = Vec::new();
            let mut unresolved = Vec::new();
            let declared = raw_dependencies
                .get(&version.dependency_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for raw in declared {
                match index.lookup(groups, provider, raw) {
                    Some(target) => dependencies.push(target),
                    None if mode == ResolveMode::Strict => {
                        return Err(PkgError::UnresolvedDependency {
                            version: version.dependency_id.clone(),
                            dependency: raw.clone(),
                        }
                        .into());
                    }
                    None => {
                        warn!(
                            "Dependency '{}' of {} could not be resolved; skipping",
                            raw, version.dependency_id
                        );
                        unresolved.push(raw.clone());
                    }
                }
            }
            resolved.push((VersionRef::new(g, v), dependencies, unresolved));
        }
    }

    for (at, dependencies, unresolved) in resolved {
        let version = &mut groups[at.group].versions[at.version];
        version.dependencies = Some(dependencies);
        version.unresolved = unresolved;
    }
    Ok(())
}
