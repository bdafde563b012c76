//! Simulated platform
//!
//! An in-memory folder/VM/port-group inventory implementing every capability
//! trait. It records each mutating request in an operation log, can delay
//! tasks in the queued and running states, can fail selected clones and NIC
//! reconfigurations, and
//! persists its inventory as JSON so the CLI can drive it across invocations.

mod inventory;
mod task;

pub use inventory::SimVm;

use crate::error::PlatformError;
use crate::handle::{Entity, FolderRef, NicInfo, NicModel, Placement, PortGroupSpec, PowerState, VmInfo, VmRef};
use crate::ops::{FolderOps, NetworkOps, Platform, VmOps};
use crate::task::{PlatformTask, TaskOutput};
use inventory::{Inventory, SimKind};
use labforge_spec::{Exercise, PlatformKind, ResourceConfig};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use task::SimTask;

/// A mutating request received by the simulated platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOp {
    /// Folder created
    CreateFolder {
        /// Folder name
        name: String,
    },
    /// Folder destroy requested
    DestroyFolder {
        /// Folder name
        name: String,
    },
    /// Clone requested
    CloneVm {
        /// Source VM or template name
        source: String,
        /// Clone name
        name: String,
    },
    /// Power-off requested
    PowerOff {
        /// VM name
        vm: String,
        /// Guest shutdown attempted first
        guest: bool,
    },
    /// Snapshot requested
    Snapshot {
        /// VM name
        vm: String,
        /// Snapshot name
        name: String,
    },
    /// Template conversion
    ConvertToTemplate {
        /// VM name
        vm: String,
    },
    /// Resource override requested
    EditResources {
        /// VM name
        vm: String,
    },
    /// Annotation change requested
    SetNote {
        /// VM name
        vm: String,
    },
    /// NIC removal requested
    RemoveNic {
        /// VM name
        vm: String,
        /// NIC index
        index: usize,
    },
    /// NIC addition requested
    AddNic {
        /// VM name
        vm: String,
        /// Bound network
        network: String,
        /// Device model
        model: NicModel,
    },
    /// NIC rebinding requested
    EditNic {
        /// VM name
        vm: String,
        /// NIC index
        index: usize,
        /// Bound network
        network: String,
    },
    /// VM destroy requested
    DestroyVm {
        /// VM name
        vm: String,
    },
    /// Port group created
    CreateNetwork {
        /// Network name
        name: String,
        /// VLAN tag
        vlan: u16,
    },
    /// Port group removed
    DestroyNetwork {
        /// Network name
        name: String,
    },
}

/// Fault injection for the simulated platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimFaults {
    /// Polls each task spends queued
    pub queued_polls: u32,
    /// Polls each task spends running
    pub running_polls: u32,
    /// Clone destination names whose clone task fails
    pub failing_clones: Vec<String>,
    /// VM names whose NIC add and rebind tasks fail
    pub failing_nics: Vec<String>,
}

/// In-memory platform
#[derive(Debug, Clone, Default)]
pub struct SimPlatform {
    inventory: Arc<Mutex<Inventory>>,
    ops: Arc<Mutex<Vec<SimOp>>>,
    faults: Arc<Mutex<SimFaults>>,
}

impl SimPlatform {
    /// Empty inventory containing only the root folder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With fault injection
    #[must_use]
    pub fn with_faults(self, faults: SimFaults) -> Self {
        self.set_faults(faults);
        self
    }

    /// Replace the fault configuration
    pub fn set_faults(&self, faults: SimFaults) {
        *self.faults.lock() = faults;
    }

    /// Restore a persisted inventory
    ///
    /// # Errors
    /// Returns [`PlatformError::Backend`] if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlatformError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlatformError::Backend(format!("reading {}: {e}", path.display())))?;
        let inventory: Inventory = serde_json::from_str(&text)
            .map_err(|e| PlatformError::Backend(format!("parsing {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded simulated inventory");
        Ok(Self {
            inventory: Arc::new(Mutex::new(inventory)),
            ..Self::default()
        })
    }

    /// Persist the inventory
    ///
    /// # Errors
    /// Returns [`PlatformError::Backend`] if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PlatformError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&*self.inventory.lock())
            .map_err(|e| PlatformError::Backend(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| PlatformError::Backend(format!("writing {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "saved simulated inventory");
        Ok(())
    }

    /// Folder at a '/'-separated path below the root, creating missing segments
    ///
    /// # Errors
    /// Returns [`PlatformError`] if a segment names a non-folder
    pub fn ensure_folder_path(&self, path: &str) -> Result<FolderRef, PlatformError> {
        self.inventory.lock().ensure_path(path).map(FolderRef::new)
    }

    /// Place a VM directly, bypassing the operation log
    ///
    /// # Errors
    /// Returns [`PlatformError`] for duplicate names or a missing folder
    pub fn add_vm(&self, folder: &FolderRef, name: &str, vm: SimVm) -> Result<VmRef, PlatformError> {
        self.inventory
            .lock()
            .insert(folder.as_str(), name, SimKind::Vm(vm))
            .map(VmRef::new)
    }

    /// Place a non-folder, non-VM object
    ///
    /// # Errors
    /// Returns [`PlatformError`] for duplicate names or a missing folder
    pub fn add_other(&self, folder: &FolderRef, name: &str, kind: &str) -> Result<(), PlatformError> {
        self.inventory
            .lock()
            .insert(folder.as_str(), name, SimKind::Other(kind.to_string()))
            .map(|_| ())
    }

    /// Place a port group directly, bypassing the operation log
    pub fn add_network(&self, spec: PortGroupSpec) {
        self.inventory.lock().insert_network(spec);
    }

    /// Force a power state
    ///
    /// # Errors
    /// Returns [`PlatformError`] if `vm` is not a VM
    pub fn set_power(&self, vm: &VmRef, state: PowerState) -> Result<(), PlatformError> {
        let mut inventory = self.inventory.lock();
        let (_, sim) = inventory.vm_mut(vm.as_str())?;
        sim.power_state = state;
        Ok(())
    }

    /// Add a template for every VM-platform service of `exercise` under
    /// `template_root`, skipping templates that already exist
    ///
    /// # Errors
    /// Returns [`PlatformError`] if a template folder cannot be created
    pub fn seed_templates(&self, exercise: &Exercise, template_root: &str) -> Result<usize, PlatformError> {
        let mut inventory = self.inventory.lock();
        let mut added = 0;
        for template in exercise.services.iter().filter_map(|s| s.template_path()) {
            let path = format!("{template_root}/{template}");
            if inventory.lookup(&path).is_some() {
                continue;
            }
            let (folder, name) = match path.rsplit_once('/') {
                Some((folder, name)) => (folder, name),
                None => ("", path.as_str()),
            };
            let folder = inventory.ensure_path(folder)?;
            inventory.insert(&folder, name, SimKind::Vm(SimVm::template(true, 1)))?;
            added += 1;
        }
        tracing::info!(added, root = template_root, "seeded simulated templates");
        Ok(added)
    }

    /// Entity at a '/'-separated path below the root
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<Entity> {
        self.inventory.lock().lookup(path)
    }

    /// Full simulated state of a VM
    #[must_use]
    pub fn vm(&self, vm: &VmRef) -> Option<SimVm> {
        self.inventory.lock().vm(vm.as_str()).ok().cloned()
    }

    /// A port group by name
    #[must_use]
    pub fn network(&self, name: &str) -> Option<PortGroupSpec> {
        self.inventory.lock().network(name).cloned()
    }

    /// Operations received so far, in order
    #[must_use]
    pub fn ops(&self) -> Vec<SimOp> {
        self.ops.lock().clone()
    }

    /// Number of received operations matching `pred`
    pub fn count_ops(&self, pred: impl Fn(&SimOp) -> bool) -> usize {
        self.ops.lock().iter().filter(|op| pred(op)).count()
    }

    /// Forget the operation log
    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    fn record(&self, op: SimOp) {
        tracing::trace!(?op, "simulated platform request");
        self.ops.lock().push(op);
    }

    fn task(
        &self,
        name: &'static str,
        entity: String,
        apply: impl FnOnce(&mut Inventory) -> Result<TaskOutput, PlatformError> + Send + 'static,
    ) -> Box<dyn PlatformTask> {
        let faults = self.faults.lock();
        let delays = (faults.queued_polls, faults.running_polls);
        Box::new(SimTask::new(name, entity, Arc::clone(&self.inventory), delays, apply))
    }

    fn nic_fault(&self, vm_name: &str) -> Option<PlatformError> {
        let failing = self
            .faults
            .lock()
            .failing_nics
            .iter()
            .any(|f| f.eq_ignore_ascii_case(vm_name));
        failing.then(|| PlatformError::TaskFailed {
            task: "reconfigure".to_string(),
            entity: vm_name.to_string(),
            message: "injected NIC failure".to_string(),
        })
    }

    fn vm_name(&self, vm: &VmRef) -> Result<String, PlatformError> {
        let inventory = self.inventory.lock();
        inventory.vm(vm.as_str())?;
        Ok(inventory.name_of(vm.as_str()))
    }

    fn require_network(&self, name: &str) -> Result<(), PlatformError> {
        if self.inventory.lock().network(name).is_some() {
            Ok(())
        } else {
            Err(PlatformError::not_found(name))
        }
    }
}

fn power_fault(entity: &str, state: PowerState) -> PlatformError {
    PlatformError::InvalidPowerState {
        entity: entity.to_string(),
        state: state.to_string(),
    }
}

#[async_trait::async_trait]
impl FolderOps for SimPlatform {
    async fn root_folder(&self) -> Result<FolderRef, PlatformError> {
        Ok(FolderRef::new(self.inventory.lock().root()))
    }

    async fn children(&self, folder: &FolderRef) -> Result<Vec<Entity>, PlatformError> {
        self.inventory.lock().children(folder.as_str())
    }

    async fn create_folder(&self, parent: &FolderRef, name: &str) -> Result<FolderRef, PlatformError> {
        self.record(SimOp::CreateFolder {
            name: name.to_string(),
        });
        self.inventory
            .lock()
            .insert(parent.as_str(), name, SimKind::Folder)
            .map(FolderRef::new)
    }

    async fn destroy_folder(&self, folder: &FolderRef) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = {
            let inventory = self.inventory.lock();
            let node = inventory.require_folder(folder.as_str())?;
            if node.parent.is_none() {
                return Err(PlatformError::InvalidState {
                    entity: node.name.clone(),
                    reason: "the root folder cannot be destroyed".to_string(),
                });
            }
            node.name.clone()
        };
        self.record(SimOp::DestroyFolder { name: name.clone() });
        let id = folder.as_str().to_string();
        Ok(self.task("destroy", name, move |inventory| {
            inventory.remove_subtree(&id);
            Ok(TaskOutput::None)
        }))
    }
}

#[async_trait::async_trait]
impl VmOps for SimPlatform {
    async fn vm_info(&self, vm: &VmRef) -> Result<VmInfo, PlatformError> {
        self.inventory.lock().vm_info(vm.as_str())
    }

    async fn clone_vm(
        &self,
        source: &VmRef,
        folder: &FolderRef,
        name: &str,
        _placement: &Placement,
    ) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let source_name = self.vm_name(source)?;
        self.inventory.lock().require_folder(folder.as_str())?;
        self.record(SimOp::CloneVm {
            source: source_name,
            name: name.to_string(),
        });

        let failing = self
            .faults
            .lock()
            .failing_clones
            .iter()
            .any(|f| f.eq_ignore_ascii_case(name));
        let (source, folder, clone_name) = (source.as_str().to_string(), folder.as_str().to_string(), name.to_string());
        Ok(self.task("clone", name.to_string(), move |inventory| {
            if failing {
                return Err(PlatformError::TaskFailed {
                    task: "clone".to_string(),
                    entity: clone_name,
                    message: "injected clone failure".to_string(),
                });
            }
            let copy = inventory.vm(&source)?.fresh_clone();
            let id = inventory.insert(&folder, &clone_name, SimKind::Vm(copy))?;
            Ok(TaskOutput::Vm(VmRef::new(id)))
        }))
    }

    async fn power_off(&self, vm: &VmRef, attempt_guest: bool) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.record(SimOp::PowerOff {
            vm: name.clone(),
            guest: attempt_guest,
        });
        let id = vm.as_str().to_string();
        Ok(self.task("power-off", name, move |inventory| {
            let (name, sim) = inventory.vm_mut(&id)?;
            if sim.power_state != PowerState::PoweredOn {
                return Err(power_fault(name, sim.power_state));
            }
            sim.power_state = PowerState::PoweredOff;
            Ok(TaskOutput::None)
        }))
    }

    async fn snapshot(
        &self,
        vm: &VmRef,
        name: &str,
        _description: &str,
    ) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let vm_name = self.vm_name(vm)?;
        self.record(SimOp::Snapshot {
            vm: vm_name.clone(),
            name: name.to_string(),
        });
        let (id, snapshot) = (vm.as_str().to_string(), name.to_string());
        Ok(self.task("snapshot", vm_name, move |inventory| {
            let (_, sim) = inventory.vm_mut(&id)?;
            sim.snapshots.push(snapshot);
            Ok(TaskOutput::None)
        }))
    }

    async fn convert_to_template(&self, vm: &VmRef) -> Result<(), PlatformError> {
        let name = self.vm_name(vm)?;
        self.record(SimOp::ConvertToTemplate { vm: name });
        let mut inventory = self.inventory.lock();
        let (name, sim) = inventory.vm_mut(vm.as_str())?;
        if sim.is_template {
            return Err(PlatformError::InvalidState {
                entity: name.to_string(),
                reason: "already a template".to_string(),
            });
        }
        if sim.power_state != PowerState::PoweredOff {
            return Err(power_fault(name, sim.power_state));
        }
        sim.is_template = true;
        Ok(())
    }

    async fn edit_resources(
        &self,
        vm: &VmRef,
        resources: &ResourceConfig,
    ) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.record(SimOp::EditResources { vm: name.clone() });
        let (id, resources) = (vm.as_str().to_string(), *resources);
        Ok(self.task("reconfigure", name, move |inventory| {
            let (_, sim) = inventory.vm_mut(&id)?;
            sim.cpus = resources.cpus.or(sim.cpus);
            sim.cores = resources.cores.or(sim.cores);
            sim.memory = resources.memory.or(sim.memory);
            Ok(TaskOutput::None)
        }))
    }

    async fn set_note(&self, vm: &VmRef, note: &str) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.record(SimOp::SetNote { vm: name.clone() });
        let (id, note) = (vm.as_str().to_string(), note.to_string());
        Ok(self.task("reconfigure", name, move |inventory| {
            let (_, sim) = inventory.vm_mut(&id)?;
            sim.note = Some(note);
            Ok(TaskOutput::None)
        }))
    }

    async fn remove_nic(&self, vm: &VmRef, index: usize) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.record(SimOp::RemoveNic {
            vm: name.clone(),
            index,
        });
        let id = vm.as_str().to_string();
        Ok(self.task("reconfigure", name, move |inventory| {
            let (name, sim) = inventory.vm_mut(&id)?;
            if index >= sim.nics.len() {
                return Err(PlatformError::not_found(format!("{name} NIC {index}")));
            }
            sim.nics.remove(index);
            Ok(TaskOutput::None)
        }))
    }

    async fn add_nic(
        &self,
        vm: &VmRef,
        network: &str,
        model: NicModel,
    ) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.require_network(network)?;
        self.record(SimOp::AddNic {
            vm: name.clone(),
            network: network.to_string(),
            model,
        });
        let fault = self.nic_fault(&name);
        let (id, network) = (vm.as_str().to_string(), network.to_string());
        Ok(self.task("reconfigure", name, move |inventory| {
            if let Some(fault) = fault {
                return Err(fault);
            }
            let (_, sim) = inventory.vm_mut(&id)?;
            sim.nics.push(NicInfo {
                network: Some(network),
                model,
            });
            Ok(TaskOutput::None)
        }))
    }

    async fn edit_nic(
        &self,
        vm: &VmRef,
        index: usize,
        network: &str,
    ) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.require_network(network)?;
        self.record(SimOp::EditNic {
            vm: name.clone(),
            index,
            network: network.to_string(),
        });
        let fault = self.nic_fault(&name);
        let (id, network) = (vm.as_str().to_string(), network.to_string());
        Ok(self.task("reconfigure", name, move |inventory| {
            if let Some(fault) = fault {
                return Err(fault);
            }
            let (name, sim) = inventory.vm_mut(&id)?;
            let Some(nic) = sim.nics.get_mut(index) else {
                return Err(PlatformError::not_found(format!("{name} NIC {index}")));
            };
            nic.network = Some(network);
            Ok(TaskOutput::None)
        }))
    }

    async fn destroy_vm(&self, vm: &VmRef) -> Result<Box<dyn PlatformTask>, PlatformError> {
        let name = self.vm_name(vm)?;
        self.record(SimOp::DestroyVm { vm: name.clone() });
        let id = vm.as_str().to_string();
        Ok(self.task("destroy", name, move |inventory| {
            let (name, sim) = inventory.vm_mut(&id)?;
            if sim.power_state == PowerState::PoweredOn {
                return Err(power_fault(name, sim.power_state));
            }
            inventory.remove_subtree(&id);
            Ok(TaskOutput::None)
        }))
    }
}

#[async_trait::async_trait]
impl NetworkOps for SimPlatform {
    async fn network_exists(&self, name: &str) -> Result<bool, PlatformError> {
        Ok(self.inventory.lock().network(name).is_some())
    }

    async fn ensure_network(&self, spec: &PortGroupSpec) -> Result<(), PlatformError> {
        let mut inventory = self.inventory.lock();
        if inventory.network(&spec.name).is_some() {
            return Ok(());
        }
        if spec.name.trim().is_empty() {
            return Err(PlatformError::InvalidName {
                name: spec.name.clone(),
            });
        }
        self.record(SimOp::CreateNetwork {
            name: spec.name.clone(),
            vlan: spec.vlan,
        });
        inventory.insert_network(spec.clone());
        Ok(())
    }

    async fn networks(&self) -> Result<Vec<String>, PlatformError> {
        Ok(self.inventory.lock().network_names())
    }

    async fn network_vlans(&self) -> Result<Vec<u16>, PlatformError> {
        Ok(self.inventory.lock().network_vlans())
    }

    async fn destroy_network(&self, name: &str) -> Result<(), PlatformError> {
        self.inventory.lock().remove_network(name)?;
        self.record(SimOp::DestroyNetwork {
            name: name.to_string(),
        });
        Ok(())
    }
}

impl Platform for SimPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Vsphere
    }
}
