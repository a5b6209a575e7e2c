//! On-disk layout of an install root.
//!
//! ```text
//! <root>/
//!   <name>/                      package directory (payload + manifest + descriptor)
//!     <name>.manifest.json
//!     <name>.manifest.json.meta
//!     package.json
//!   .staging/<name>/             scratch area used while an install is in flight
//!   .catalog/<group>/<src>.json  persisted source catalogs
//!   index.json                   installed package index
//! ```

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

use crate::runtime::Runtime;

pub const DESCRIPTOR_FILE: &str = "package.json";
pub const INDEX_FILE: &str = "index.json";
pub const MANIFEST_SUFFIX: &str = ".manifest.json";
const STAGING_DIR: &str = ".staging";
const CATALOG_DIR: &str = ".catalog";

pub struct PackageLayout<'a, R: Runtime> {
    runtime: &'a R,
    install_root: PathBuf,
}

impl<'a, R: Runtime> PackageLayout<'a, R> {
    pub fn new(runtime: &'a R, install_root: PathBuf) -> Self {
        Self {
            runtime,
            install_root,
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Returns: `<install_root>/<name>`
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.install_root.join(name)
    }

    pub fn manifest_file_name(name: &str) -> String {
        format!("{}{}", name, MANIFEST_SUFFIX)
    }

    /// Returns: `<install_root>/<name>/<name>.manifest.json`
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(Self::manifest_file_name(name))
    }

    /// Returns: `<install_root>/<name>/package.json`
    pub fn descriptor_path(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(DESCRIPTOR_FILE)
    }

    /// Returns: `<install_root>/.staging`
    pub fn staging_root(&self) -> PathBuf {
        self.install_root.join(STAGING_DIR)
    }

    /// Returns: `<install_root>/.staging/<name>/<name>.manifest.json`
    pub fn staged_manifest_path(&self, name: &str) -> PathBuf {
        self.staging_root()
            .join(name)
            .join(Self::manifest_file_name(name))
    }

    /// Returns: `<install_root>/.catalog`
    pub fn catalog_root(&self) -> PathBuf {
        self.install_root.join(CATALOG_DIR)
    }

    /// Returns: `<install_root>/index.json`
    pub fn index_path(&self) -> PathBuf {
        self.install_root.join(INDEX_FILE)
    }

    /// A package counts as installed once its manifest or descriptor has been
    /// committed. A directory holding only a payload is a leftover of an
    /// interrupted install.
    pub fn is_installed(&self, name: &str) -> bool {
        self.runtime.exists(&self.manifest_path(name))
            || self.runtime.exists(&self.descriptor_path(name))
    }

    /// Package directories currently present under the install root,
    /// skipping the staging and catalog areas.
    pub fn installed_packages(&self) -> Result<Vec<String>> {
        if !self.runtime.exists(&self.install_root) {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in self.runtime.read_dir(&self.install_root)? {
            if let Some(name) = entry.file_name().and_then(|n| n.to_str())
                && !name.starts_with('.')
                && self.runtime.is_dir(&entry)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Reject package names that would not map to a single directory directly under the root.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') {
        bail!("Invalid package name '{}'", name);
    }

    let path = Path::new(name);
    let mut components = path.components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal {
        bail!("Invalid package name '{}': must be a single path segment", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    #[test]
    fn test_paths() {
        let runtime = MockRuntime::new();
        let layout = PackageLayout::new(&runtime, PathBuf::from("/root"));

        assert_eq!(layout.package_dir("alpha"), PathBuf::from("/root/alpha"));
        assert_eq!(
            layout.manifest_path("alpha"),
            PathBuf::from("/root/alpha/alpha.manifest.json")
        );
        assert_eq!(
            layout.descriptor_path("alpha"),
            PathBuf::from("/root/alpha/package.json")
        );
        assert_eq!(
            layout.staged_manifest_path("alpha"),
            PathBuf::from("/root/.staging/alpha/alpha.manifest.json")
        );
        assert_eq!(layout.index_path(), PathBuf::from("/root/index.json"));
    }

    #[test]
    fn test_is_installed() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/root/alpha/alpha.manifest.json")))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/root/beta/beta.manifest.json")))
            .returning(|_| false);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/root/beta/package.json")))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/root/gamma/gamma.manifest.json")))
            .returning(|_| false);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/root/gamma/package.json")))
            .returning(|_| false);

        let layout = PackageLayout::new(&runtime, PathBuf::from("/root"));
        assert!(layout.is_installed("alpha"));
        assert!(layout.is_installed("beta"));
        assert!(!layout.is_installed("gamma"));
    }

    #[test]
    fn test_payload_only_directory_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("alpha")).unwrap();
        std::fs::write(dir.path().join("alpha/alpha.dll"), "payload").unwrap();

        let runtime = crate::runtime::RealRuntime;
        let layout = PackageLayout::new(&runtime, dir.path().to_path_buf());
        assert!(!layout.is_installed("alpha"));

        std::fs::write(dir.path().join("alpha/package.json"), "{}").unwrap();
        assert!(layout.is_installed("alpha"));
    }

    #[test]
    fn test_installed_packages_skips_hidden_and_files() {
        let mut runtime = MockRuntime::new();
        let root = PathBuf::from("/root");

        runtime
            .expect_exists()
            .with(eq(root.clone()))
            .returning(|_| true);
        runtime.expect_read_dir().with(eq(root.clone())).returning(|p| {
            Ok(vec![
                p.join(".staging"),
                p.join("beta"),
                p.join("alpha"),
                p.join("index.json"),
            ])
        });
        runtime
            .expect_is_dir()
            .returning(|p| !p.ends_with("index.json"));

        let layout = PackageLayout::new(&runtime, root);
        assert_eq!(layout.installed_packages().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_installed_packages_missing_root() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let layout = PackageLayout::new(&runtime, PathBuf::from("/missing"));
        assert!(layout.installed_packages().unwrap().is_empty());
    }

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("alpha").is_ok());
        assert!(validate_package_name("Acme.Alpha").is_ok());
        assert!(validate_package_name("").is_err());
        assert!(validate_package_name(".staging").is_err());
        assert!(validate_package_name("..").is_err());
        assert!(validate_package_name("a/b").is_err());
        assert!(validate_package_name("/etc").is_err());
    }
}
