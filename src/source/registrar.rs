use anyhow::{Result, bail};
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::package::{Group, Version, VersionInfo, validate_package_name};

use super::SourceKey;

/// Raw dependency identifiers declared by each version, keyed by the version's dependency id.
pub type RawDependencies = HashMap<String, Vec<String>>;

/// Collects the groups a provider registers during one load cycle.
///
/// The raw dependency map lives only as long as the registrar: it is handed to
/// the resolver together with the groups and dropped afterwards.
#[derive(Debug, Default)]
pub struct Registrar {
    source: SourceKey,
    groups: Vec<Group>,
    raw_dependencies: RawDependencies,
    group_ids: HashSet<String>,
}

impl Registrar {
    pub fn new(source: SourceKey) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Register one group with its versions.
    ///
    /// Group names must be usable as a directory name; group and version
    /// identifiers must be unique within the load cycle.
    pub fn add_group<T, S>(
        &mut self,
        author: &str,
        name: &str,
        description: &str,
        dependency_id: &str,
        tags: T,
        version_infos: Vec<VersionInfo>,
    ) -> Result<()>
    where
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_package_name(name)?;
        if self.group_ids.contains(dependency_id) {
            bail!(
                "Duplicate group identifier '{}' in source {}",
                dependency_id,
                self.source
            );
        }
        if self.groups.iter().any(|g| g.name == name) {
            bail!("Duplicate package name '{}' in source {}", name, self.source);
        }
        let mut seen = HashSet::new();
        for info in &version_infos {
            if self.raw_dependencies.contains_key(&info.dependency_id)
                || !seen.insert(info.dependency_id.as_str())
            {
                bail!(
                    "Duplicate version identifier '{}' in source {}",
                    info.dependency_id,
                    self.source
                );
            }
        }

        let group_index = self.groups.len();
        let mut versions = Vec::with_capacity(version_infos.len());
        for info in version_infos {
            let mut raw = Vec::with_capacity(info.dependencies.len());
            for dependency in info.dependencies {
                if !raw.contains(&dependency) {
                    raw.push(dependency);
                }
            }
            self.raw_dependencies
                .insert(info.dependency_id.clone(), raw);

            versions.push(Version {
                version: info.version,
                dependency_id: info.dependency_id,
                group: group_index,
                dependencies: None,
                unresolved: vec![],
            });
        }
        self.group_ids.insert(dependency_id.to_string());

        debug!(
            "Registered group {} with {} version(s)",
            name,
            versions.len()
        );
        self.groups.push(Group {
            author: author.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            dependency_id: dependency_id.to_string(),
            tags: tags.into_iter().map(Into::into).collect::<BTreeSet<_>>(),
            versions,
            source: self.source.clone(),
        });
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Group>, RawDependencies) {
        (self.groups, self.raw_dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registrar() -> Registrar {
        Registrar::new(SourceKey::new("local", "default"))
    }

    #[test]
    fn test_add_group_records_versions_and_raw_dependencies() {
        let mut r = registrar();
        r.add_group(
            "acme",
            "B",
            "second",
            "B",
            ["net", "core"],
            vec![
                VersionInfo::new("1.0", "B-1.0", vec![]),
                VersionInfo::new(
                    "2.0",
                    "B-2.0",
                    vec!["A-1.0".into(), "C".into(), "A-1.0".into()],
                ),
            ],
        )
        .unwrap();

        let (groups, raw) = r.into_parts();
        let group = &groups[0];
        assert_eq!(group.versions.len(), 2);
        assert!(group.versions.iter().all(|v| v.dependencies.is_none()));
        assert_eq!(group.tags.iter().collect::<Vec<_>>(), vec!["core", "net"]);
        assert_eq!(group.source, SourceKey::new("local", "default"));

        assert_eq!(raw["B-1.0"], Vec::<String>::new());
        assert_eq!(raw["B-2.0"], vec!["A-1.0".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_versions_point_back_to_their_group() {
        let mut r = registrar();
        r.add_group("a", "A", "", "A", Vec::<String>::new(), vec![
            VersionInfo::new("1.0", "A-1.0", vec![]),
        ])
        .unwrap();
        r.add_group("a", "B", "", "B", Vec::<String>::new(), vec![
            VersionInfo::new("1.0", "B-1.0", vec![]),
        ])
        .unwrap();

        let (groups, _) = r.into_parts();
        assert_eq!(groups[1].versions[0].group, 1);
    }

    #[test]
    fn test_duplicate_group_id_rejected() {
        let mut r = registrar();
        r.add_group("a", "A", "", "same", Vec::<String>::new(), vec![])
            .unwrap();
        let err = r
            .add_group("a", "B", "", "same", Vec::<String>::new(), vec![])
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate group identifier"));
    }

    #[test]
    fn test_duplicate_version_id_rejected() {
        let mut r = registrar();
        r.add_group("a", "A", "", "A", Vec::<String>::new(), vec![
            VersionInfo::new("1.0", "X", vec![]),
        ])
        .unwrap();
        let err = r
            .add_group("a", "B", "", "B", Vec::<String>::new(), vec![
                VersionInfo::new("1.0", "X", vec![]),
            ])
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate version identifier"));
    }

    #[test]
    fn test_invalid_package_name_rejected() {
        let mut r = registrar();
        assert!(
            r.add_group("a", "../evil", "", "E", Vec::<String>::new(), vec![])
                .is_err()
        );
        assert!(r.into_parts().0.is_empty());
    }
}
