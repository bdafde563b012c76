//! Infrastructure configuration
//!
//! One block per platform, keyed by platform name. Only the VM-platform
//! block drives the materialization engine; other blocks are accepted and
//! ignored.

use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kinds of objects whose instance counts are guarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Folder instances
    Folder,
    /// Service (VM) instances
    Service,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folder => f.write_str("folder"),
            Self::Service => f.write_str("service"),
        }
    }
}

/// Warn/error limits for one object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// Counts above this proceed with a warning
    pub warn: u32,
    /// Counts above this abort the branch
    pub error: u32,
}

impl Threshold {
    /// Create a threshold pair
    #[inline]
    #[must_use]
    pub fn new(warn: u32, error: u32) -> Self {
        Self { warn, error }
    }
}

/// Threshold table keyed by object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Folder limits
    #[serde(default = "Thresholds::default_folder")]
    pub folder: Threshold,
    /// Service limits
    #[serde(default = "Thresholds::default_service")]
    pub service: Threshold,
}

impl Thresholds {
    fn default_folder() -> Threshold {
        Threshold::new(25, 50)
    }

    fn default_service() -> Threshold {
        Threshold::new(50, 70)
    }

    /// Limits for an object kind
    #[inline]
    #[must_use]
    pub fn for_kind(&self, kind: ObjectKind) -> Threshold {
        match kind {
            ObjectKind::Folder => self.folder,
            ObjectKind::Service => self.service,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            folder: Self::default_folder(),
            service: Self::default_service(),
        }
    }
}

/// The `vmware-vsphere` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VsphereConfig {
    /// Server hostname
    #[serde(default)]
    pub hostname: String,
    /// Server port
    #[serde(default = "VsphereConfig::default_port")]
    pub port: u16,
    /// JSON file holding credentials
    #[serde(default)]
    pub login_file: Option<String>,
    /// Datacenter name
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Datastore for clones
    #[serde(default)]
    pub datastore: Option<String>,
    /// Resource pool for clones
    #[serde(default)]
    pub resource_pool: Option<String>,
    /// Host for clones and port groups
    #[serde(default)]
    pub host: Option<String>,
    /// Folder path, from the inventory root, treated as the server root
    #[serde(default)]
    pub server_root: Option<String>,
    /// Folder path, under the server root, that holds service templates
    pub template_folder: String,
    /// Default virtual switch for port groups
    #[serde(default = "VsphereConfig::default_vswitch")]
    pub vswitch: String,
    /// Create base networks that do not exist yet
    #[serde(default = "VsphereConfig::default_create")]
    pub default_create: bool,
    /// Per-operation wait limit, in seconds
    #[serde(default = "VsphereConfig::default_timeout")]
    pub timeout_secs: u64,
    /// Instance-count thresholds
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl VsphereConfig {
    fn default_port() -> u16 {
        443
    }

    fn default_vswitch() -> String {
        "vSwitch0".to_string()
    }

    fn default_create() -> bool {
        true
    }

    fn default_timeout() -> u64 {
        60
    }

    /// Minimal configuration with the given template folder
    #[must_use]
    pub fn new(template_folder: impl Into<String>) -> Self {
        Self {
            hostname: String::new(),
            port: Self::default_port(),
            login_file: None,
            datacenter: None,
            datastore: None,
            resource_pool: None,
            host: None,
            server_root: None,
            template_folder: template_folder.into(),
            vswitch: Self::default_vswitch(),
            default_create: Self::default_create(),
            timeout_secs: Self::default_timeout(),
            thresholds: Thresholds::default(),
        }
    }

    /// With server root
    #[inline]
    #[must_use]
    pub fn with_server_root(mut self, root: impl Into<String>) -> Self {
        self.server_root = Some(root.into());
        self
    }

    /// With thresholds
    #[inline]
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// With default base-network creation switched on or off
    #[inline]
    #[must_use]
    pub fn with_default_create(mut self, create: bool) -> Self {
        self.default_create = create;
        self
    }
}

/// Infrastructure file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// VM platform block
    #[serde(rename = "vmware-vsphere", default)]
    pub vsphere: Option<VsphereConfig>,
}

impl InfraConfig {
    /// Parse an infrastructure document
    ///
    /// # Errors
    /// Returns [`SpecError::Yaml`] for malformed documents
    pub fn from_yaml_str(text: &str) -> Result<Self, SpecError> {
        let config: Self = serde_yaml::from_str(text)?;
        if config.vsphere.is_none() {
            tracing::warn!("infrastructure file configures no vmware-vsphere platform");
        }
        Ok(config)
    }

    /// Read an infrastructure file
    ///
    /// # Errors
    /// Returns [`SpecError::Io`] if unreadable, otherwise see [`InfraConfig::from_yaml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let infra = InfraConfig::from_yaml_str(
            "vmware-vsphere:\n  hostname: vcenter.lab\n  template-folder: Templates\n",
        )
        .unwrap();
        let vsphere = infra.vsphere.unwrap();
        assert_eq!(vsphere.port, 443);
        assert_eq!(vsphere.vswitch, "vSwitch0");
        assert!(vsphere.default_create);
        assert_eq!(vsphere.timeout_secs, 60);
        assert_eq!(vsphere.thresholds, Thresholds::default());
    }

    #[test]
    fn default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.for_kind(ObjectKind::Folder), Threshold::new(25, 50));
        assert_eq!(t.for_kind(ObjectKind::Service), Threshold::new(50, 70));
    }

    #[test]
    fn partial_thresholds_keep_other_defaults() {
        let infra = InfraConfig::from_yaml_str(
            "vmware-vsphere:\n  template-folder: T\n  thresholds:\n    folder: {warn: 2, error: 4}\n",
        )
        .unwrap();
        let t = infra.vsphere.unwrap().thresholds;
        assert_eq!(t.folder, Threshold::new(2, 4));
        assert_eq!(t.service, Threshold::new(50, 70));
    }

    #[test]
    fn other_platforms_are_ignored() {
        let infra = InfraConfig::from_yaml_str("docker:\n  url: unix:///var/run/docker.sock\n").unwrap();
        assert!(infra.vsphere.is_none());
    }
}
