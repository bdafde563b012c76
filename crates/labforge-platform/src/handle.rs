//! Opaque handles and value types exchanged with a platform

use serde::{Deserialize, Serialize};

macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a platform identifier
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Platform identifier
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

handle_type!(
    /// Handle of a folder
    FolderRef
);
handle_type!(
    /// Handle of a VM or template
    VmRef
);

/// A child of a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// Sub-folder
    Folder {
        /// Handle
        handle: FolderRef,
        /// Display name
        name: String,
    },
    /// VM or template
    Vm {
        /// Handle
        handle: VmRef,
        /// Display name
        name: String,
    },
    /// Any other object (vApp, resource pool, ...)
    Other {
        /// Display name
        name: String,
        /// Platform type name
        kind: String,
    },
}

impl Entity {
    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::Vm { name, .. } | Self::Other { name, .. } => name,
        }
    }

    /// Folder handle, if this is a folder
    #[must_use]
    pub fn as_folder(&self) -> Option<&FolderRef> {
        match self {
            Self::Folder { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// VM handle, if this is a VM
    #[must_use]
    pub fn as_vm(&self) -> Option<&VmRef> {
        match self {
            Self::Vm { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

/// VM power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerState {
    /// Running
    PoweredOn,
    /// Stopped
    #[default]
    PoweredOff,
    /// Suspended
    Suspended,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoweredOn => f.write_str("poweredOn"),
            Self::PoweredOff => f.write_str("poweredOff"),
            Self::Suspended => f.write_str("suspended"),
        }
    }
}

/// Virtual NIC device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NicModel {
    /// Paravirtual adapter, needs guest tools
    Vmxnet3,
    /// Emulated adapter
    E1000,
}

impl NicModel {
    /// Model to use for a VM with or without guest tools
    #[inline]
    #[must_use]
    pub fn for_tools(has_tools: bool) -> Self {
        if has_tools {
            Self::Vmxnet3
        } else {
            Self::E1000
        }
    }
}

impl std::fmt::Display for NicModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vmxnet3 => f.write_str("vmxnet3"),
            Self::E1000 => f.write_str("e1000"),
        }
    }
}

/// A virtual NIC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicInfo {
    /// Bound network, if any
    pub network: Option<String>,
    /// Device model
    pub model: NicModel,
}

/// Point-in-time view of a VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInfo {
    /// Display name
    pub name: String,
    /// Power state
    pub power_state: PowerState,
    /// Whether the VM has been converted to a template
    pub is_template: bool,
    /// Whether guest tools are installed and running
    pub has_tools: bool,
    /// NICs in device order
    pub nics: Vec<NicInfo>,
}

/// Where clones are placed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Resource pool
    pub resource_pool: Option<String>,
    /// Datastore
    pub datastore: Option<String>,
    /// Host
    pub host: Option<String>,
}

/// A port group to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroupSpec {
    /// Port group name
    pub name: String,
    /// Virtual switch to attach to
    pub vswitch: String,
    /// VLAN tag
    pub vlan: u16,
    /// Promiscuous mode
    pub promiscuous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nic_model_follows_tools() {
        assert_eq!(NicModel::for_tools(true), NicModel::Vmxnet3);
        assert_eq!(NicModel::for_tools(false), NicModel::E1000);
    }

    #[test]
    fn entity_accessors() {
        let folder = Entity::Folder {
            handle: FolderRef::new("folder-1"),
            name: "Pod".into(),
        };
        assert_eq!(folder.name(), "Pod");
        assert_eq!(folder.as_folder().map(FolderRef::as_str), Some("folder-1"));
        assert!(folder.as_vm().is_none());
    }
}
