//! Capability traits a target platform implements
//!
//! The engine never touches vendor objects directly. It holds handles and
//! calls through these traits; each target platform (hypervisor, container
//! engine, cloud) supplies one implementation.

use crate::error::PlatformError;
use crate::handle::{Entity, FolderRef, NicModel, Placement, PortGroupSpec, VmInfo, VmRef};
use crate::task::PlatformTask;
use labforge_spec::{PlatformKind, ResourceConfig};

/// Folder tree operations
#[async_trait::async_trait]
pub trait FolderOps: Send + Sync {
    /// Top of the folder inventory
    async fn root_folder(&self) -> Result<FolderRef, PlatformError>;

    /// Direct children of a folder, in platform order
    async fn children(&self, folder: &FolderRef) -> Result<Vec<Entity>, PlatformError>;

    /// Direct child with the given name, compared case-insensitively
    async fn find_by_name(
        &self,
        folder: &FolderRef,
        name: &str,
    ) -> Result<Option<Entity>, PlatformError> {
        let wanted = name.to_lowercase();
        Ok(self
            .children(folder)
            .await?
            .into_iter()
            .find(|child| child.name().to_lowercase() == wanted))
    }

    /// Create a sub-folder
    async fn create_folder(&self, parent: &FolderRef, name: &str) -> Result<FolderRef, PlatformError>;

    /// Destroy a folder
    async fn destroy_folder(&self, folder: &FolderRef) -> Result<Box<dyn PlatformTask>, PlatformError>;
}

/// VM lifecycle operations
#[async_trait::async_trait]
pub trait VmOps: Send + Sync {
    /// Current view of a VM
    async fn vm_info(&self, vm: &VmRef) -> Result<VmInfo, PlatformError>;

    /// Clone `source` into `folder` as `name`
    async fn clone_vm(
        &self,
        source: &VmRef,
        folder: &FolderRef,
        name: &str,
        placement: &Placement,
    ) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Power off, trying a guest shutdown first when `attempt_guest` is set
    async fn power_off(&self, vm: &VmRef, attempt_guest: bool) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Take a snapshot
    async fn snapshot(
        &self,
        vm: &VmRef,
        name: &str,
        description: &str,
    ) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Convert a powered-off VM to a template
    async fn convert_to_template(&self, vm: &VmRef) -> Result<(), PlatformError>;

    /// Whether the VM is a template
    async fn is_template(&self, vm: &VmRef) -> Result<bool, PlatformError> {
        Ok(self.vm_info(vm).await?.is_template)
    }

    /// Apply CPU and memory overrides
    async fn edit_resources(
        &self,
        vm: &VmRef,
        resources: &ResourceConfig,
    ) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Replace the VM annotation
    async fn set_note(&self, vm: &VmRef, note: &str) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Remove the NIC at `index`
    async fn remove_nic(&self, vm: &VmRef, index: usize) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Append a NIC bound to `network`
    async fn add_nic(
        &self,
        vm: &VmRef,
        network: &str,
        model: NicModel,
    ) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Rebind the NIC at `index` to `network`
    async fn edit_nic(
        &self,
        vm: &VmRef,
        index: usize,
        network: &str,
    ) -> Result<Box<dyn PlatformTask>, PlatformError>;

    /// Destroy a powered-off VM
    async fn destroy_vm(&self, vm: &VmRef) -> Result<Box<dyn PlatformTask>, PlatformError>;
}

/// Network (port group) operations
///
/// Network names are compared case-insensitively.
#[async_trait::async_trait]
pub trait NetworkOps: Send + Sync {
    /// Whether a network with this name exists
    async fn network_exists(&self, name: &str) -> Result<bool, PlatformError>;

    /// Create the port group if it does not exist
    async fn ensure_network(&self, spec: &PortGroupSpec) -> Result<(), PlatformError>;

    /// Names of all networks
    async fn networks(&self) -> Result<Vec<String>, PlatformError>;

    /// VLAN tags carried by existing networks
    async fn network_vlans(&self) -> Result<Vec<u16>, PlatformError>;

    /// Remove a network
    async fn destroy_network(&self, name: &str) -> Result<(), PlatformError>;
}

/// A complete target platform
pub trait Platform: FolderOps + VmOps + NetworkOps {
    /// Family of services this platform materializes
    fn kind(&self) -> PlatformKind;
}
