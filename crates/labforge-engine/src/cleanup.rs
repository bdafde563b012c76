//! Prefix-filtered recursive teardown of a folder subtree

use crate::context::MaterializationContext;
use crate::error::EngineError;
use futures::future::BoxFuture;
use labforge_platform::{Entity, FolderRef, Platform, PowerState, VmRef};

/// What [`cleanup`] destroys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Only VMs whose name starts with this prefix; empty matches all
    pub vm_prefix: String,
    /// Only folders whose name starts with this prefix; empty matches all
    pub folder_prefix: String,
    /// Descend into matching folders without destroying them
    pub recursive: bool,
    /// Wipe matching folders with their whole subtree
    pub destroy_folders: bool,
    /// Destroy the folder itself, after its children
    pub destroy_self: bool,
    /// Child names left alone whatever the prefixes say
    pub keep: Vec<String>,
}

impl CleanupOptions {
    /// Destroy everything, the folder included
    #[must_use]
    pub fn wipe() -> Self {
        Self {
            recursive: true,
            destroy_folders: true,
            destroy_self: true,
            ..Self::default()
        }
    }

    /// Same prefix for VMs and folders
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.vm_prefix = prefix.to_string();
        self.folder_prefix = prefix.to_string();
        self
    }
}

fn has_prefix(name: &str, prefix: &str) -> bool {
    name.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// Tear down the matching content of `folder`
///
/// Children are processed before the folder itself, so with `destroy_self`
/// the folder is destroyed last.
///
/// # Errors
/// Entity failures are recorded in the report; only cancellation is returned
pub fn cleanup<'s, P: Platform + ?Sized>(
    platform: &'s P,
    ctx: &'s mut MaterializationContext,
    folder: &'s FolderRef,
    path: &'s str,
    options: &'s CleanupOptions,
) -> BoxFuture<'s, Result<(), EngineError>> {
    Box::pin(async move {
        tracing::debug!(folder = path, "cleaning folder");
        let listed = platform.children(folder).await.map_err(EngineError::from);
        let children = ctx.absorb(path, listed)?.unwrap_or_default();

        for child in children {
            ctx.check_cancelled()?;
            if options.keep.iter().any(|kept| kept.eq_ignore_ascii_case(child.name())) {
                tracing::debug!(entity = child.name(), "keeping");
                continue;
            }
            match child {
                Entity::Vm { handle, name } if has_prefix(&name, &options.vm_prefix) => {
                    let entity = format!("{path}/{name}");
                    let result = destroy_vm(platform, ctx, &handle).await;
                    if ctx.absorb(&entity, result)?.is_some() {
                        ctx.report.vms_destroyed += 1;
                        tracing::info!(vm = %entity, "destroyed VM");
                    }
                }
                Entity::Folder { handle, name } if has_prefix(&name, &options.folder_prefix) => {
                    let nested = format!("{path}/{name}");
                    if options.destroy_folders {
                        cleanup(platform, ctx, &handle, &nested, &CleanupOptions::wipe()).await?;
                    } else if options.recursive {
                        let deeper = CleanupOptions {
                            destroy_self: false,
                            keep: Vec::new(),
                            ..options.clone()
                        };
                        cleanup(platform, ctx, &handle, &nested, &deeper).await?;
                    }
                }
                _ => {}
            }
        }

        if options.destroy_self {
            let result = match platform.destroy_folder(folder).await {
                Ok(task) => ctx.wait(task).await.map(|_| ()),
                Err(e) => Err(e.into()),
            };
            if ctx.absorb(path, result)?.is_some() {
                ctx.report.folders_destroyed += 1;
                tracing::info!(folder = path, "destroyed folder");
            }
        }
        Ok(())
    })
}

/// Power off if needed, then destroy
async fn destroy_vm<P: Platform + ?Sized>(
    platform: &P,
    ctx: &MaterializationContext,
    vm: &VmRef,
) -> Result<(), EngineError> {
    if platform.vm_info(vm).await?.power_state == PowerState::PoweredOn {
        ctx.wait(platform.power_off(vm, false).await?).await?;
    }
    ctx.wait(platform.destroy_vm(vm).await?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EngineSettings;
    use labforge_platform::{CancelFlag, SimOp, SimPlatform, SimVm};
    use pretty_assertions::assert_eq;

    fn fresh_ctx() -> MaterializationContext {
        MaterializationContext::new(&EngineSettings::new("Templates"), CancelFlag::new())
    }

    fn destroyed(sim: &SimPlatform) -> Vec<String> {
        sim.ops()
            .into_iter()
            .filter_map(|op| match op {
                SimOp::DestroyVm { vm } => Some(format!("vm:{vm}")),
                SimOp::DestroyFolder { name } => Some(format!("folder:{name}")),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn wipe_destroys_children_before_parents() {
        let sim = SimPlatform::new();
        let top = sim.ensure_folder_path("Top").unwrap();
        let nested = sim.ensure_folder_path("Top/Nested").unwrap();
        sim.add_vm(&nested, "inner", SimVm::vm(true, 1).powered_on()).unwrap();
        sim.add_vm(&top, "outer", SimVm::vm(true, 1)).unwrap();

        let mut ctx = fresh_ctx();
        cleanup(&sim, &mut ctx, &top, "Top", &CleanupOptions::wipe()).await.unwrap();

        assert_eq!(
            destroyed(&sim),
            vec!["vm:inner", "folder:Nested", "vm:outer", "folder:Top"]
        );
        assert_eq!(sim.count_ops(|op| matches!(op, SimOp::PowerOff { guest: false, .. })), 1);
        assert!(sim.lookup("Top").is_none());
        assert_eq!(ctx.report.vms_destroyed, 2);
        assert_eq!(ctx.report.folders_destroyed, 2);
    }

    #[tokio::test]
    async fn prefix_filters_vms_and_folders() {
        let sim = SimPlatform::new();
        let top = sim.ensure_folder_path("Top").unwrap();
        sim.add_vm(&top, "(MASTER) web", SimVm::vm(true, 1)).unwrap();
        sim.add_vm(&top, "keep", SimVm::vm(true, 1)).unwrap();
        sim.ensure_folder_path("Top/Other").unwrap();

        let options = CleanupOptions {
            recursive: true,
            ..CleanupOptions::default()
        }
        .with_prefix("(MASTER) ");
        let mut ctx = fresh_ctx();
        cleanup(&sim, &mut ctx, &top, "Top", &options).await.unwrap();

        assert_eq!(destroyed(&sim), vec!["vm:(MASTER) web"]);
        assert!(sim.lookup("Top/keep").is_some());
        assert!(sim.lookup("Top/Other").is_some());
    }

    #[tokio::test]
    async fn kept_children_survive_a_wipe() {
        let sim = SimPlatform::new();
        let root = sim.ensure_folder_path("Exercise").unwrap();
        sim.ensure_folder_path("Exercise/MASTER-FOLDERS/(MASTER) Pod").unwrap();
        sim.ensure_folder_path("Exercise/Pod 00").unwrap();

        let options = CleanupOptions {
            destroy_folders: true,
            keep: vec!["master-folders".to_string()],
            ..CleanupOptions::default()
        };
        let mut ctx = fresh_ctx();
        cleanup(&sim, &mut ctx, &root, "Exercise", &options).await.unwrap();

        assert_eq!(destroyed(&sim), vec!["folder:Pod 00"]);
        assert!(sim.lookup("Exercise/MASTER-FOLDERS/(MASTER) Pod").is_some());
    }

    #[tokio::test]
    async fn recursive_search_keeps_folders() {
        let sim = SimPlatform::new();
        let top = sim.ensure_folder_path("Top").unwrap();
        let deep = sim.ensure_folder_path("Top/Deep").unwrap();
        sim.add_vm(&deep, "web", SimVm::vm(true, 1)).unwrap();

        let options = CleanupOptions {
            recursive: true,
            destroy_self: true,
            ..CleanupOptions::default()
        };
        let mut ctx = fresh_ctx();
        cleanup(&sim, &mut ctx, &top, "Top", &options).await.unwrap();

        assert_eq!(destroyed(&sim), vec!["vm:web", "folder:Top"]);
    }
}
