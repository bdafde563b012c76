//! Object store behind the simulated platform

use crate::error::PlatformError;
use crate::handle::{Entity, FolderRef, NicInfo, NicModel, PortGroupSpec, PowerState, VmInfo, VmRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// State of a simulated VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimVm {
    /// Power state
    pub power_state: PowerState,
    /// Template flag
    pub is_template: bool,
    /// Guest tools present
    pub has_tools: bool,
    /// NICs in device order
    pub nics: Vec<NicInfo>,
    /// CPU override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    /// Cores-per-socket override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    /// Memory override, MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Snapshot names, oldest first
    #[serde(default)]
    pub snapshots: Vec<String>,
}

impl SimVm {
    /// A template with `nics` unbound adapters
    #[must_use]
    pub fn template(has_tools: bool, nics: usize) -> Self {
        Self {
            is_template: true,
            ..Self::vm(has_tools, nics)
        }
    }

    /// A powered-off VM with `nics` unbound adapters
    #[must_use]
    pub fn vm(has_tools: bool, nics: usize) -> Self {
        let nic = NicInfo {
            network: None,
            model: NicModel::for_tools(has_tools),
        };
        Self {
            power_state: PowerState::PoweredOff,
            is_template: false,
            has_tools,
            nics: vec![nic; nics],
            cpus: None,
            cores: None,
            memory: None,
            note: None,
            snapshots: Vec::new(),
        }
    }

    /// Same VM, powered on
    #[inline]
    #[must_use]
    pub fn powered_on(mut self) -> Self {
        self.power_state = PowerState::PoweredOn;
        self
    }

    /// Fresh clone of this VM: same hardware, powered off, no snapshots
    pub(crate) fn fresh_clone(&self) -> Self {
        Self {
            power_state: PowerState::PoweredOff,
            is_template: false,
            snapshots: Vec::new(),
            ..self.clone()
        }
    }
}

/// Kind of a simulated object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum SimKind {
    Folder,
    Vm(SimVm),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SimNode {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) kind: SimKind,
}

/// Whole simulated inventory, serialized as the persisted state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Inventory {
    next_id: u64,
    root: String,
    nodes: IndexMap<String, SimNode>,
    networks: IndexMap<String, PortGroupSpec>,
}

impl Default for Inventory {
    fn default() -> Self {
        let root = "folder-0".to_string();
        let mut nodes = IndexMap::new();
        nodes.insert(
            root.clone(),
            SimNode {
                name: "vm".to_string(),
                parent: None,
                kind: SimKind::Folder,
            },
        );
        Self {
            next_id: 1,
            root,
            nodes,
            networks: IndexMap::new(),
        }
    }
}

impl Inventory {
    pub(crate) fn root(&self) -> &str {
        &self.root
    }

    fn node(&self, id: &str) -> Result<&SimNode, PlatformError> {
        self.nodes.get(id).ok_or_else(|| PlatformError::not_found(id))
    }

    pub(crate) fn name_of(&self, id: &str) -> String {
        self.nodes
            .get(id)
            .map_or_else(|| id.to_string(), |node| node.name.clone())
    }

    pub(crate) fn require_folder(&self, id: &str) -> Result<&SimNode, PlatformError> {
        let node = self.node(id)?;
        match node.kind {
            SimKind::Folder => Ok(node),
            _ => Err(PlatformError::InvalidState {
                entity: node.name.clone(),
                reason: "not a folder".to_string(),
            }),
        }
    }

    pub(crate) fn vm(&self, id: &str) -> Result<&SimVm, PlatformError> {
        let node = self.node(id)?;
        match &node.kind {
            SimKind::Vm(vm) => Ok(vm),
            _ => Err(PlatformError::InvalidState {
                entity: node.name.clone(),
                reason: "not a virtual machine".to_string(),
            }),
        }
    }

    pub(crate) fn vm_mut(&mut self, id: &str) -> Result<(&str, &mut SimVm), PlatformError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| PlatformError::not_found(id))?;
        match &mut node.kind {
            SimKind::Vm(vm) => Ok((node.name.as_str(), vm)),
            _ => Err(PlatformError::InvalidState {
                entity: node.name.clone(),
                reason: "not a virtual machine".to_string(),
            }),
        }
    }

    pub(crate) fn vm_info(&self, id: &str) -> Result<VmInfo, PlatformError> {
        let name = self.node(id)?.name.clone();
        let vm = self.vm(id)?;
        Ok(VmInfo {
            name,
            power_state: vm.power_state,
            is_template: vm.is_template,
            has_tools: vm.has_tools,
            nics: vm.nics.clone(),
        })
    }

    fn entity(id: &str, node: &SimNode) -> Entity {
        match &node.kind {
            SimKind::Folder => Entity::Folder {
                handle: FolderRef::new(id),
                name: node.name.clone(),
            },
            SimKind::Vm(_) => Entity::Vm {
                handle: VmRef::new(id),
                name: node.name.clone(),
            },
            SimKind::Other(kind) => Entity::Other {
                name: node.name.clone(),
                kind: kind.clone(),
            },
        }
    }

    pub(crate) fn children(&self, folder: &str) -> Result<Vec<Entity>, PlatformError> {
        self.require_folder(folder)?;
        Ok(self
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.as_deref() == Some(folder))
            .map(|(id, node)| Self::entity(id, node))
            .collect())
    }

    fn child_named(&self, folder: &str, name: &str) -> Option<(&String, &SimNode)> {
        let wanted = name.to_lowercase();
        self.nodes
            .iter()
            .find(|(_, node)| node.parent.as_deref() == Some(folder) && node.name.to_lowercase() == wanted)
    }

    /// Entity at a '/'-separated path below the root
    pub(crate) fn lookup(&self, path: &str) -> Option<Entity> {
        let mut current = self.root.clone();
        let mut found = self.nodes.get(&current).map(|node| Self::entity(&current, node));
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (id, node) = self.child_named(&current, segment)?;
            found = Some(Self::entity(id, node));
            current.clone_from(id);
        }
        found
    }

    pub(crate) fn insert(&mut self, parent: &str, name: &str, kind: SimKind) -> Result<String, PlatformError> {
        self.require_folder(parent)?;
        if name.trim().is_empty() || name.contains('/') || name.len() > 80 {
            return Err(PlatformError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.child_named(parent, name).is_some() {
            return Err(PlatformError::DuplicateName {
                name: name.to_string(),
            });
        }
        let prefix = match kind {
            SimKind::Folder => "folder",
            SimKind::Vm(_) => "vm",
            SimKind::Other(_) => "obj",
        };
        let id = format!("{prefix}-{}", self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id.clone(),
            SimNode {
                name: name.to_string(),
                parent: Some(parent.to_string()),
                kind,
            },
        );
        Ok(id)
    }

    /// Folder at `path`, creating missing segments
    pub(crate) fn ensure_path(&mut self, path: &str) -> Result<String, PlatformError> {
        let mut current = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let existing = self.child_named(&current, segment).map(|(id, _)| id.clone());
            current = match existing {
                Some(id) => id,
                None => self.insert(&current, segment, SimKind::Folder)?,
            };
            self.require_folder(&current)?;
        }
        Ok(current)
    }

    pub(crate) fn remove_subtree(&mut self, id: &str) {
        let children: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.as_deref() == Some(id))
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            self.remove_subtree(&child);
        }
        self.nodes.shift_remove(id);
    }

    pub(crate) fn network(&self, name: &str) -> Option<&PortGroupSpec> {
        self.networks.get(&name.to_lowercase())
    }

    pub(crate) fn network_names(&self) -> Vec<String> {
        self.networks.values().map(|spec| spec.name.clone()).collect()
    }

    pub(crate) fn network_vlans(&self) -> Vec<u16> {
        self.networks.values().map(|spec| spec.vlan).collect()
    }

    pub(crate) fn insert_network(&mut self, spec: PortGroupSpec) {
        self.networks.insert(spec.name.to_lowercase(), spec);
    }

    pub(crate) fn remove_network(&mut self, name: &str) -> Result<(), PlatformError> {
        let key = name.to_lowercase();
        if !self.networks.contains_key(&key) {
            return Err(PlatformError::not_found(name));
        }
        let in_use = self.nodes.values().any(|node| match &node.kind {
            SimKind::Vm(vm) => vm
                .nics
                .iter()
                .any(|nic| nic.network.as_deref().map(str::to_lowercase).as_deref() == Some(key.as_str())),
            _ => false,
        });
        if in_use {
            return Err(PlatformError::ResourceInUse {
                entity: name.to_string(),
            });
        }
        self.networks.shift_remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_case_insensitive() {
        let mut inv = Inventory::default();
        let root = inv.root().to_string();
        inv.insert(&root, "Pod", SimKind::Folder).unwrap();
        let err = inv.insert(&root, "POD", SimKind::Folder).unwrap_err();
        assert!(matches!(err, PlatformError::DuplicateName { .. }));
    }

    #[test]
    fn ensure_path_reuses_segments() {
        let mut inv = Inventory::default();
        let a = inv.ensure_path("Lab/Templates").unwrap();
        let b = inv.ensure_path("lab/templates").unwrap();
        assert_eq!(a, b);
        assert!(matches!(inv.lookup("Lab/Templates"), Some(Entity::Folder { .. })));
    }

    #[test]
    fn remove_subtree_removes_descendants() {
        let mut inv = Inventory::default();
        let pod = inv.ensure_path("Pod").unwrap();
        inv.insert(&pod, "web", SimKind::Vm(SimVm::vm(true, 1))).unwrap();
        inv.remove_subtree(&pod);
        assert!(inv.lookup("Pod").is_none());
        assert!(inv.lookup("Pod/web").is_none());
        assert!(inv.children(inv.root()).unwrap().is_empty());
    }

    #[test]
    fn bound_network_cannot_be_removed() {
        let mut inv = Inventory::default();
        inv.insert_network(PortGroupSpec {
            name: "lan".into(),
            vswitch: "vSwitch0".into(),
            vlan: 2000,
            promiscuous: false,
        });
        let root = inv.root().to_string();
        let mut vm = SimVm::vm(true, 1);
        vm.nics[0].network = Some("LAN".into());
        inv.insert(&root, "web", SimKind::Vm(vm)).unwrap();
        assert!(matches!(
            inv.remove_network("lan"),
            Err(PlatformError::ResourceInUse { .. })
        ));
    }
}
