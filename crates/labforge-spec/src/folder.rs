//! Folder tree normalization
//!
//! The raw `folders` section is a nested mapping in which a node is a base
//! folder when it has a `services` key and a parent folder otherwise. The
//! normalization pass decides this once and produces [`FolderNode`], so the
//! materializers switch on a tag instead of probing keys at every level.

use crate::error::SpecError;
use crate::instances::InstanceCount;
use crate::network::normalize_network_name;
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Keys of a folder that annotate it instead of naming a child
pub const RESERVED_KEYS: [&str; 5] = ["instances", "description", "enabled", "group", "master-group"];

/// Returns `true` for annotation keys
#[inline]
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Non-recursive annotations of a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMeta {
    /// Instance count of the folder
    pub instances: InstanceCount,
    /// Free-form description
    pub description: Option<String>,
    /// `false` disables the folder and its whole subtree
    pub enabled: bool,
    /// Group granted access to deployed instances
    pub group: Option<String>,
    /// Group granted access to masters
    pub master_group: Option<String>,
}

impl Default for FolderMeta {
    fn default() -> Self {
        Self {
            instances: InstanceCount::single(),
            description: None,
            enabled: true,
            group: None,
            master_group: None,
        }
    }
}

/// A service instance declared inside a base folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Key inside the folder's `services` mapping, used as the VM name stem
    pub name: String,
    /// Referenced service definition
    pub service: String,
    /// Referenced networks, normalized, in NIC order
    pub networks: Vec<String>,
    /// Instance count of this service inside one folder instance
    pub instances: InstanceCount,
}

impl ServiceInstance {
    /// Single instance of `service` attached to `networks`
    #[must_use]
    pub fn new(name: impl Into<String>, service: impl Into<String>, networks: &[&str]) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            networks: networks.iter().map(|n| normalize_network_name(n)).collect(),
            instances: InstanceCount::single(),
        }
    }

    /// Set the instance count
    #[inline]
    #[must_use]
    pub fn with_instances(mut self, instances: InstanceCount) -> Self {
        self.instances = instances;
        self
    }
}

/// Shape of a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderNode {
    /// Folder containing further folders
    Parent(IndexMap<String, Folder>),
    /// Folder containing service instances
    Base(IndexMap<String, ServiceInstance>),
}

/// A named folder with its annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Key in the enclosing mapping
    pub name: String,
    /// Annotations
    pub meta: FolderMeta,
    /// Children
    pub node: FolderNode,
}

impl Folder {
    /// Parent folder with the given children
    #[must_use]
    pub fn parent(name: impl Into<String>, children: Vec<Folder>) -> Self {
        Self {
            name: name.into(),
            meta: FolderMeta::default(),
            node: FolderNode::Parent(children.into_iter().map(|f| (f.name.clone(), f)).collect()),
        }
    }

    /// Base folder with the given services
    #[must_use]
    pub fn base(name: impl Into<String>, services: Vec<ServiceInstance>) -> Self {
        Self {
            name: name.into(),
            meta: FolderMeta::default(),
            node: FolderNode::Base(services.into_iter().map(|s| (s.name.clone(), s)).collect()),
        }
    }

    /// Set the instance count
    #[inline]
    #[must_use]
    pub fn with_instances(mut self, instances: InstanceCount) -> Self {
        self.meta.instances = instances;
        self
    }

    /// Set the enabled flag
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.meta.enabled = enabled;
        self
    }

    /// Whether this is a base folder
    #[inline]
    #[must_use]
    pub fn is_base(&self) -> bool {
        matches!(self.node, FolderNode::Base(_))
    }
}

/// Normalize the children of a folder mapping (or of the top-level `folders` section)
///
/// # Errors
/// Returns [`SpecError::Invalid`] when a child is not a mapping or a service
/// entry lacks its `service` reference
pub fn normalize_children(map: &Mapping, path: &str) -> Result<IndexMap<String, Folder>, SpecError> {
    let mut children = IndexMap::new();
    for (key, value) in map {
        let Some(name) = key.as_str() else {
            return Err(SpecError::invalid(
                "folder",
                path,
                format!("folder name must be a string, got {key:?}"),
            ));
        };
        if is_reserved_key(name) {
            continue;
        }
        let child_path = format!("{path}.{name}");
        let Value::Mapping(body) = value else {
            return Err(SpecError::invalid("folder", child_path, "expected a mapping"));
        };
        let folder = normalize_folder(name, body, &child_path)?;
        children.insert(name.to_string(), folder);
    }
    Ok(children)
}

fn normalize_folder(name: &str, body: &Mapping, path: &str) -> Result<Folder, SpecError> {
    let meta = read_meta(body, path)?;
    let node = match body.get("services") {
        Some(Value::Mapping(services)) => FolderNode::Base(normalize_services(services, path)?),
        Some(Value::Null) => FolderNode::Base(IndexMap::new()),
        Some(_) => {
            return Err(SpecError::invalid(
                "folder",
                format!("{path}.services"),
                "expected a mapping of service instances",
            ))
        }
        None => FolderNode::Parent(normalize_children(body, path)?),
    };
    Ok(Folder {
        name: name.to_string(),
        meta,
        node,
    })
}

fn read_meta(body: &Mapping, path: &str) -> Result<FolderMeta, SpecError> {
    let mut meta = FolderMeta::default();
    if let Some(instances) = body.get("instances") {
        meta.instances = InstanceCount::from_yaml(instances);
    }
    if let Some(enabled) = body.get("enabled") {
        meta.enabled = enabled.as_bool().ok_or_else(|| {
            SpecError::invalid("folder", format!("{path}.enabled"), "expected a boolean")
        })?;
    }
    meta.description = string_field(body, "description");
    meta.group = string_field(body, "group");
    meta.master_group = string_field(body, "master-group");
    Ok(meta)
}

fn string_field(body: &Mapping, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

fn normalize_services(
    services: &Mapping,
    path: &str,
) -> Result<IndexMap<String, ServiceInstance>, SpecError> {
    let mut out = IndexMap::new();
    for (key, value) in services {
        let Some(name) = key.as_str() else {
            return Err(SpecError::invalid(
                "service instance",
                format!("{path}.services"),
                format!("service instance name must be a string, got {key:?}"),
            ));
        };
        let entry_path = format!("{path}.services.{name}");
        let Value::Mapping(body) = value else {
            return Err(SpecError::invalid("service instance", entry_path, "expected a mapping"));
        };
        let service = string_field(body, "service").ok_or_else(|| {
            SpecError::invalid("service instance", entry_path.clone(), "missing 'service' reference")
        })?;
        let networks = match body.get("networks") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(normalize_network_name).ok_or_else(|| {
                        SpecError::invalid(
                            "service instance",
                            format!("{entry_path}.networks"),
                            format!("network reference must be a string, got {item:?}"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(SpecError::invalid(
                    "service instance",
                    format!("{entry_path}.networks"),
                    "expected a list",
                ))
            }
        };
        let instances = body
            .get("instances")
            .map(InstanceCount::from_yaml)
            .unwrap_or_default();
        out.insert(
            name.to_string(),
            ServiceInstance {
                name: name.to_string(),
                service,
                networks,
                instances,
            },
        );
    }
    Ok(out)
}
