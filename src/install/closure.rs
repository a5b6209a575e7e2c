use anyhow::{Result, anyhow};
use std::collections::HashSet;

use crate::error::PkgError;
use crate::package::{PackageLayout, VersionRef};
use crate::runtime::Runtime;
use crate::source::PackageSource;

/// Versions that must be installed for `target`, dependencies first.
///
/// Post-order depth-first walk over resolved dependencies. Each version is
/// emitted at most once, groups with a committed manifest or descriptor are
/// skipped, and at most one version per group is kept (first occurrence).
pub fn compute_install_set<R: Runtime>(
    source: &PackageSource,
    layout: &PackageLayout<'_, R>,
    target: VersionRef,
) -> Result<Vec<VersionRef>> {
    let mut walk = Walk {
        source,
        visited: HashSet::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    walk.visit(target)?;

    let mut groups = HashSet::new();
    Ok(walk
        .order
        .into_iter()
        .filter(|v| !layout.is_installed(&source.group_of(*v).name))
        .filter(|v| groups.insert(v.group))
        .collect())
}

struct Walk<'a> {
    source: &'a PackageSource,
    visited: HashSet<VersionRef>,
    stack: Vec<VersionRef>,
    order: Vec<VersionRef>,
}

impl Walk<'_> {
    fn visit(&mut self, at: VersionRef) -> Result<()> {
        if let Some(start) = self.stack.iter().position(|v| *v == at) {
            let mut chain: Vec<String> = self.stack[start..]
                .iter()
                .map(|v| self.source.version(*v).dependency_id.clone())
                .collect();
            chain.push(self.source.version(at).dependency_id.clone());
            return Err(PkgError::CyclicDependency { chain }.into());
        }
        if self.visited.contains(&at) {
            return Ok(());
        }

        let version = self.source.version(at);
        let dependencies = version.dependencies.as_ref().ok_or_else(|| {
            anyhow!(
                "Dependencies of {} have not been resolved; reload the source",
                version.dependency_id
            )
        })?;

        self.stack.push(at);
        for dependency in dependencies {
            self.visit(*dependency)?;
        }
        self.stack.pop();

        self.visited.insert(at);
        self.order.push(at);
        Ok(())
    }
}
