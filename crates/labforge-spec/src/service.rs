//! Service catalog
//!
//! Services are the reusable definitions referenced from base folders. Each
//! definition targets one platform: VM templates, container images or
//! compose files.

use crate::error::SpecError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Platform family a service (or a backend) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
    /// Hypervisor with folders, VMs and port groups
    Vsphere,
    /// Container engine
    Docker,
    /// Cloud provider
    Cloud,
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vsphere => f.write_str("vsphere"),
            Self::Docker => f.write_str("docker"),
            Self::Cloud => f.write_str("cloud"),
        }
    }
}

/// Resource overrides applied to a freshly cloned master
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceConfig {
    /// Virtual CPU count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    /// Cores per socket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    /// Memory in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

impl ResourceConfig {
    /// Whether no override is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.cores.is_none() && self.memory.is_none()
    }
}

/// Where a service's instances come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSource {
    /// VM template, located by path under the template folder
    Template(String),
    /// Container image or dockerfile
    Container {
        /// Registry image reference
        image: Option<String>,
        /// Dockerfile path
        dockerfile: Option<String>,
    },
    /// Compose file
    Compose(String),
}

impl ServiceSource {
    /// Platform able to materialize this source
    #[inline]
    #[must_use]
    pub fn platform(&self) -> PlatformKind {
        match self {
            Self::Template(_) => PlatformKind::Vsphere,
            Self::Container { .. } | Self::Compose(_) => PlatformKind::Docker,
        }
    }
}

/// A named service definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Key under `services`
    pub name: String,
    /// Instance source
    pub source: ServiceSource,
    /// Note attached to the master
    pub note: Option<String>,
    /// Resource overrides applied to the master
    pub resources: ResourceConfig,
}

impl Service {
    /// Template-backed service
    #[must_use]
    pub fn template(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ServiceSource::Template(template.into()),
            note: None,
            resources: ResourceConfig::default(),
        }
    }

    /// Platform family of this service
    #[inline]
    #[must_use]
    pub fn platform(&self) -> PlatformKind {
        self.source.platform()
    }

    /// Template path, for template-backed services
    #[must_use]
    pub fn template_path(&self) -> Option<&str> {
        match &self.source {
            ServiceSource::Template(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawService {
    template: Option<String>,
    image: Option<String>,
    dockerfile: Option<String>,
    compose_file: Option<String>,
    note: Option<String>,
    #[serde(default)]
    resource_config: ResourceConfig,
}

/// All services of an exercise, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: IndexMap<String, Service>,
}

impl ServiceCatalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `services` section
    ///
    /// # Errors
    /// Returns [`SpecError::Invalid`] for entries that define no source
    pub fn from_yaml(value: &Value) -> Result<Self, SpecError> {
        let Value::Mapping(entries) = value else {
            return Err(SpecError::invalid("services", "services", "expected a mapping"));
        };
        let mut catalog = Self::new();
        for (name, body) in entries {
            let Some(name) = name.as_str() else {
                return Err(SpecError::invalid(
                    "service",
                    "services",
                    format!("service name must be a string, got {name:?}"),
                ));
            };
            let path = format!("services.{name}");
            let raw: RawService = serde_yaml::from_value(body.clone())
                .map_err(|e| SpecError::invalid("service", path.clone(), e.to_string()))?;
            let source = if let Some(template) = raw.template {
                ServiceSource::Template(template)
            } else if raw.image.is_some() || raw.dockerfile.is_some() {
                ServiceSource::Container {
                    image: raw.image,
                    dockerfile: raw.dockerfile,
                }
            } else if let Some(file) = raw.compose_file {
                ServiceSource::Compose(file)
            } else {
                return Err(SpecError::invalid(
                    "service",
                    path,
                    "one of 'template', 'image', 'dockerfile' or 'compose-file' is required",
                ));
            };
            catalog.insert(Service {
                name: name.to_string(),
                source,
                note: raw.note,
                resources: raw.resource_config,
            });
        }
        Ok(catalog)
    }

    /// Add or replace a service
    pub fn insert(&mut self, service: Service) {
        self.services.insert(service.name.clone(), service);
    }

    /// Look up a service by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Services in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// Number of services
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
