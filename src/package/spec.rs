//! Package specification parsing for the install command.

use anyhow::{Result, anyhow};
use std::str::FromStr;

use super::LATEST_LABEL;

/// A package name that may include a version label.
/// Format: "name" or "name@version"
#[derive(Debug, PartialEq, Clone)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    /// The requested version label, defaulting to [`LATEST_LABEL`].
    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or(LATEST_LABEL)
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for PackageSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.rsplit_once('@') {
            Some((_, "")) => {
                return Err(anyhow!(
                    "Invalid format: version after @ cannot be empty. Expected 'name@version'."
                ));
            }
            Some((name, ver)) => (name, Some(ver.to_string())),
            None => (s, None),
        };

        if name.is_empty() {
            return Err(anyhow!("Invalid format: package name cannot be empty."));
        }

        Ok(PackageSpec {
            name: name.to_string(),
            version,
        })
    }
}
