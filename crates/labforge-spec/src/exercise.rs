//! Exercise specification document
//!
//! The document is parsed once per invocation and is immutable afterwards.

use crate::error::SpecError;
use crate::folder::{normalize_children, Folder};
use crate::network::NetworkCatalog;
use crate::service::ServiceCatalog;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

/// The `metadata` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    /// Exercise name
    pub name: String,
    /// Root folder name, defaults to `name`
    #[serde(default)]
    pub folder_name: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Exercise version
    #[serde(default)]
    pub version: Option<String>,
    /// Naming prefix for the exercise
    #[serde(default)]
    pub prefix: Option<String>,
    /// Folder path, under the server root, that holds the exercise root folder
    #[serde(default)]
    pub root_path: String,
    /// Infrastructure file referenced by the exercise
    #[serde(default)]
    pub infra_file: Option<String>,
}

impl Metadata {
    /// Name of the exercise root folder
    #[inline]
    #[must_use]
    pub fn root_folder_name(&self) -> &str {
        self.folder_name.as_deref().unwrap_or(&self.name)
    }
}

/// A group of users, as declared under `groups`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSpec {
    /// Number of template-group instances
    #[serde(default)]
    pub instances: Option<u32>,
    /// Active Directory group name
    #[serde(default)]
    pub ad_group: Option<String>,
    /// JSON user file
    #[serde(default)]
    pub filename: Option<String>,
    /// Inline user list
    #[serde(default)]
    pub user_list: Option<Vec<String>>,
}

impl GroupSpec {
    /// Whether this is a template group (one group per instance)
    #[inline]
    #[must_use]
    pub fn is_template(&self) -> bool {
        self.instances.is_some()
    }
}

/// A fully normalized exercise specification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exercise {
    /// The `metadata` section
    pub metadata: Metadata,
    /// The `groups` section
    pub groups: IndexMap<String, GroupSpec>,
    /// The `services` section
    pub services: ServiceCatalog,
    /// The `networks` section
    pub networks: NetworkCatalog,
    /// The `folders` section, normalized
    pub folders: IndexMap<String, Folder>,
}

impl Exercise {
    /// Parse and normalize a YAML document
    ///
    /// # Errors
    /// Returns [`SpecError`] if the YAML is invalid, a required section
    /// (`metadata`, `services`, `folders`) is missing, or a section has the
    /// wrong shape
    pub fn from_yaml_str(text: &str) -> Result<Self, SpecError> {
        let document: Value = serde_yaml::from_str(text)?;
        Self::from_value(&document)
    }

    /// Normalize an already parsed document
    ///
    /// # Errors
    /// See [`Exercise::from_yaml_str`]
    pub fn from_value(document: &Value) -> Result<Self, SpecError> {
        let Value::Mapping(sections) = document else {
            return Err(SpecError::invalid("specification", "", "expected a mapping"));
        };

        let metadata: Metadata = serde_yaml::from_value(
            sections
                .get("metadata")
                .cloned()
                .ok_or(SpecError::MissingSection("metadata"))?,
        )?;

        let groups = match sections.get("groups") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(value) => serde_yaml::from_value(value.clone())?,
        };

        let services = ServiceCatalog::from_yaml(
            sections
                .get("services")
                .ok_or(SpecError::MissingSection("services"))?,
        )?;

        let networks = match sections.get("networks") {
            None | Some(Value::Null) => NetworkCatalog::new(),
            Some(value) => NetworkCatalog::from_yaml(value)?,
        };

        let folders = match sections.get("folders") {
            Some(Value::Mapping(map)) => normalize_children(map, "folders")?,
            Some(_) => return Err(SpecError::invalid("folders", "folders", "expected a mapping")),
            None => return Err(SpecError::MissingSection("folders")),
        };

        for key in sections.keys().filter_map(Value::as_str) {
            if !matches!(
                key,
                "metadata" | "groups" | "services" | "networks" | "folders" | "resources"
            ) {
                tracing::warn!(section = key, "unknown specification section");
            }
        }

        tracing::debug!(
            exercise = %metadata.name,
            services = services.len(),
            networks = networks.len(),
            folders = folders.len(),
            "normalized specification"
        );

        Ok(Self {
            metadata,
            groups,
            services,
            networks,
            folders,
        })
    }

    /// Read and normalize a YAML file
    ///
    /// # Errors
    /// Returns [`SpecError::Io`] if the file cannot be read, otherwise see
    /// [`Exercise::from_yaml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Number of folder nodes in the tree, at every depth
    #[must_use]
    pub fn folder_count(&self) -> usize {
        fn count(folders: &IndexMap<String, Folder>) -> usize {
            folders
                .values()
                .map(|f| match &f.node {
                    crate::folder::FolderNode::Parent(children) => 1 + count(children),
                    crate::folder::FolderNode::Base(_) => 1,
                })
                .sum()
        }
        count(&self.folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
metadata:
  name: "Intro Lab"
  root-path: "exercises"
groups:
  Students:
    user-list: [alice, bob]
services:
  nginx:
    template: nginx-template
networks:
  generic-networks:
    lan: {subnet: 192.168.1.0/24}
folders:
  Pod:
    instances: 2
    services:
      web: {service: nginx, networks: [lan]}
"#;

    #[test]
    fn parses_all_sections() {
        let exercise = Exercise::from_yaml_str(SPEC).unwrap();
        assert_eq!(exercise.metadata.root_folder_name(), "Intro Lab");
        assert_eq!(exercise.metadata.root_path, "exercises");
        assert_eq!(exercise.groups["Students"].user_list.as_ref().unwrap().len(), 2);
        assert_eq!(exercise.services.len(), 1);
        assert_eq!(exercise.networks.len(), 1);
        assert_eq!(exercise.folder_count(), 1);
    }

    #[test]
    fn folder_name_overrides_root_name() {
        let spec = SPEC.replace("root-path", "folder-name: \"lab-root\"\n  root-path");
        let exercise = Exercise::from_yaml_str(&spec).unwrap();
        assert_eq!(exercise.metadata.root_folder_name(), "lab-root");
    }

    #[test]
    fn missing_folders_section() {
        let err = Exercise::from_yaml_str("metadata: {name: x}\nservices: {}\n").unwrap_err();
        assert!(matches!(err, SpecError::MissingSection("folders")));
    }

    #[test]
    fn groups_and_networks_are_optional() {
        let exercise =
            Exercise::from_yaml_str("metadata: {name: x}\nservices: {}\nfolders: {}\n").unwrap();
        assert!(exercise.groups.is_empty());
        assert!(exercise.networks.is_empty());
    }
}
