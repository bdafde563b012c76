//! Network catalog
//!
//! Networks are declared under `networks.unique-networks` (one fixed identity
//! shared by every instance) or `networks.generic-networks` (realized once per
//! instance). Names are normalized to lowercase when first read.

use crate::error::SpecError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

/// Section key for unique networks
pub const UNIQUE_NETWORKS: &str = "unique-networks";
/// Section key for generic networks
pub const GENERIC_NETWORKS: &str = "generic-networks";

/// Which section a network was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkKind {
    /// Fixed identity shared by all instances
    Unique,
    /// Per-instance identity
    Generic,
}

impl NetworkKind {
    /// Section key of this kind
    #[inline]
    #[must_use]
    pub fn section(self) -> &'static str {
        match self {
            Self::Unique => UNIQUE_NETWORKS,
            Self::Generic => GENERIC_NETWORKS,
        }
    }
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique => f.write_str("unique"),
            Self::Generic => f.write_str("generic"),
        }
    }
}

/// Canonical form of a network name as used for lookups and platform calls
#[must_use]
pub fn normalize_network_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A declared network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDef {
    /// Normalized name
    pub name: String,
    /// Declaring section
    pub kind: NetworkKind,
    /// Subnet in CIDR notation
    pub subnet: Option<String>,
    /// Virtual switch override
    pub vswitch: Option<String>,
    /// VLAN tag (unique networks only)
    pub vlan: Option<u16>,
    /// Free-form description
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawNetwork {
    subnet: Option<String>,
    vswitch: Option<String>,
    vlan: Option<u16>,
    description: Option<String>,
}

/// All networks of an exercise, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkCatalog {
    unique: IndexMap<String, NetworkDef>,
    generic: IndexMap<String, NetworkDef>,
}

impl NetworkCatalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `networks` section
    ///
    /// # Errors
    /// Returns [`SpecError::Invalid`] if a section or entry is not a mapping
    pub fn from_yaml(value: &Value) -> Result<Self, SpecError> {
        let mut catalog = Self::new();
        let Value::Mapping(sections) = value else {
            return Err(SpecError::invalid("networks", "networks", "expected a mapping"));
        };
        for (key, section) in sections {
            let kind = match key.as_str() {
                Some(UNIQUE_NETWORKS) => NetworkKind::Unique,
                Some(GENERIC_NETWORKS) => NetworkKind::Generic,
                other => {
                    tracing::warn!(section = ?other, "ignoring unknown network section");
                    continue;
                }
            };
            let Value::Mapping(entries) = section else {
                if section.is_null() {
                    continue;
                }
                return Err(SpecError::invalid(
                    "networks",
                    format!("networks.{}", kind.section()),
                    "expected a mapping",
                ));
            };
            for (name, body) in entries {
                let Some(name) = name.as_str() else {
                    return Err(SpecError::invalid(
                        "network",
                        format!("networks.{}", kind.section()),
                        format!("network name must be a string, got {name:?}"),
                    ));
                };
                let raw: RawNetwork = if body.is_null() {
                    RawNetwork::default()
                } else {
                    serde_yaml::from_value(body.clone()).map_err(|e| {
                        SpecError::invalid(
                            "network",
                            format!("networks.{}.{name}", kind.section()),
                            e.to_string(),
                        )
                    })?
                };
                catalog.insert(NetworkDef {
                    name: normalize_network_name(name),
                    kind,
                    subnet: raw.subnet,
                    vswitch: raw.vswitch,
                    vlan: raw.vlan,
                    description: raw.description,
                });
            }
        }
        Ok(catalog)
    }

    /// Add a network definition, replacing any previous one of the same kind and name
    pub fn insert(&mut self, def: NetworkDef) {
        let table = match def.kind {
            NetworkKind::Unique => &mut self.unique,
            NetworkKind::Generic => &mut self.generic,
        };
        table.insert(def.name.clone(), def);
    }

    /// Kind of a referenced network, looking in unique networks first
    #[must_use]
    pub fn classify(&self, name: &str) -> Option<NetworkKind> {
        self.get(name).map(|def| def.kind)
    }

    /// Look up a network by (un-normalized) name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NetworkDef> {
        let key = normalize_network_name(name);
        self.unique.get(&key).or_else(|| self.generic.get(&key))
    }

    /// Unique networks followed by generic networks, each in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &NetworkDef> {
        self.unique.values().chain(self.generic.values())
    }

    /// Number of declared networks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.unique.len() + self.generic.len()
    }

    /// Whether no networks are declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty() && self.generic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(yaml: &str) -> NetworkCatalog {
        NetworkCatalog::from_yaml(&serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn classifies_by_section() {
        let nets = catalog(
            "unique-networks:\n  mgmt: {vlan: 100}\ngeneric-networks:\n  lan: {subnet: 10.0.0.0/24}\n",
        );
        assert_eq!(nets.classify("mgmt"), Some(NetworkKind::Unique));
        assert_eq!(nets.classify("lan"), Some(NetworkKind::Generic));
        assert_eq!(nets.classify("wan"), None);
        assert_eq!(nets.get("mgmt").unwrap().vlan, Some(100));
    }

    #[test]
    fn names_are_normalized() {
        let nets = catalog("generic-networks:\n  Client-LAN: {}\n");
        assert_eq!(nets.iter().next().unwrap().name, "client-lan");
        assert_eq!(nets.classify("CLIENT-lan"), Some(NetworkKind::Generic));
    }

    #[test]
    fn iteration_order_is_unique_then_generic() {
        let nets = catalog(
            "generic-networks:\n  b: {}\n  a: {}\nunique-networks:\n  z: {}\n",
        );
        let names: Vec<_> = nets.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["z", "b", "a"]);
    }

    #[test]
    fn rejects_non_mapping_section() {
        let value = serde_yaml::from_str("unique-networks: [a, b]").unwrap();
        assert!(NetworkCatalog::from_yaml(&value).is_err());
    }
}
