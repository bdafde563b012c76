//! Deployment materializer
//!
//! Mirrors the master walk with instance multiplication: every folder and
//! service is expanded by its resolved instance count, service instances are
//! cloned from the promoted masters and their NICs are rewired to networks
//! resolved for the enclosing folder instance.

use crate::context::MaterializationContext;
use crate::error::{EngineError, LookupKind};
use crate::instances::resolve_instances;
use crate::naming::{folder_instance_name, master_name, service_instance_name};
use crate::nics::{reconcile_nics, resolve_networks};
use crate::path::ensure_folder;
use crate::settings::EngineSettings;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use labforge_platform::{Entity, FolderRef, Platform, PlatformError};
use labforge_spec::{Exercise, Folder, FolderNode, ObjectKind, Service, ServiceInstance};

/// Deploys the folder tree of one exercise from its promoted masters
pub struct Deployer<'a, P: Platform + ?Sized> {
    platform: &'a P,
    exercise: &'a Exercise,
    settings: &'a EngineSettings,
}

impl<'a, P: Platform + ?Sized> Deployer<'a, P> {
    /// Deployer over `exercise`
    #[must_use]
    pub fn new(platform: &'a P, exercise: &'a Exercise, settings: &'a EngineSettings) -> Self {
        Self {
            platform,
            exercise,
            settings,
        }
    }

    /// Deploy `folders` below `parent`
    ///
    /// `index` is the instance index inherited from the nearest multiplied
    /// ancestor folder; it selects the generic networks of the services below.
    ///
    /// # Errors
    /// Entity failures are recorded in the report; only cancellation and
    /// structural errors are returned
    pub fn deploy<'s>(
        &'s self,
        ctx: &'s mut MaterializationContext,
        parent: &'s FolderRef,
        folders: &'s IndexMap<String, Folder>,
        path: &'s str,
        index: u32,
    ) -> BoxFuture<'s, Result<(), EngineError>> {
        Box::pin(async move {
            for folder in folders.values() {
                ctx.check_cancelled()?;
                let entity = format!("{path}/{}", folder.name);
                if !folder.meta.enabled {
                    tracing::debug!(folder = %entity, "folder disabled, skipping subtree");
                    ctx.report.skipped += 1;
                    continue;
                }

                let resolved = resolve_instances(
                    &folder.meta.instances,
                    ObjectKind::Folder,
                    &folder.name,
                    &ctx.guard,
                    &self.exercise.groups,
                );
                let Some(resolved) = ctx.absorb(&entity, resolved)? else {
                    continue;
                };
                ctx.note_verdict(resolved.verdict);

                for i in 0..resolved.count {
                    ctx.check_cancelled()?;
                    let name = folder_instance_name(&folder.name, resolved.prefix.as_deref(), i, resolved.count);
                    let instance_path = format!("{path}/{name}");
                    let created = ensure_folder(self.platform, parent, &name)
                        .await
                        .map_err(EngineError::from);
                    let Some((handle, outcome)) = ctx.absorb(&instance_path, created)? else {
                        continue;
                    };
                    ctx.note_folder(outcome);

                    let inner = if resolved.count > 1 { i } else { index };
                    match &folder.node {
                        FolderNode::Base(services) => {
                            self.deploy_services(ctx, &handle, services, &instance_path, inner)
                                .await?;
                        }
                        FolderNode::Parent(children) => {
                            self.deploy(ctx, &handle, children, &instance_path, inner).await?;
                        }
                    }
                }
            }
            Ok(())
        })
    }

    async fn deploy_services(
        &self,
        ctx: &mut MaterializationContext,
        folder: &FolderRef,
        services: &IndexMap<String, ServiceInstance>,
        path: &str,
        index: u32,
    ) -> Result<(), EngineError> {
        for instance in services.values() {
            ctx.check_cancelled()?;
            let entity = format!("{path}/{}", instance.name);
            let lookup = self
                .exercise
                .services
                .get(&instance.service)
                .ok_or_else(|| EngineError::lookup(LookupKind::Service, &instance.service));
            let Some(service) = ctx.absorb(&entity, lookup)? else {
                continue;
            };
            if service.platform() != self.platform.kind() {
                tracing::debug!(service = %service.name, platform = %service.platform(), "service targets another platform, skipping");
                ctx.report.skipped += 1;
                continue;
            }

            let resolved = resolve_instances(
                &instance.instances,
                ObjectKind::Service,
                &instance.name,
                &ctx.guard,
                &self.exercise.groups,
            );
            let Some(resolved) = ctx.absorb(&entity, resolved)? else {
                continue;
            };
            ctx.note_verdict(resolved.verdict);

            for j in 0..resolved.count {
                ctx.check_cancelled()?;
                let vm_name = service_instance_name(&instance.name, resolved.prefix.as_deref(), j, resolved.count);
                let vm_entity = format!("{path}/{vm_name}");
                let result = self
                    .deploy_instance(ctx, folder, instance, service, &vm_name, &vm_entity, index)
                    .await;
                ctx.absorb(&vm_entity, result)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn deploy_instance(
        &self,
        ctx: &mut MaterializationContext,
        folder: &FolderRef,
        instance: &ServiceInstance,
        service: &Service,
        vm_name: &str,
        entity: &str,
        index: u32,
    ) -> Result<(), EngineError> {
        let master = master_name(&service.name);
        let source = ctx
            .registry
            .get(&master)
            .cloned()
            .ok_or_else(|| EngineError::lookup(LookupKind::Master, &master))?;

        let vm = if let Some(Entity::Vm { handle, .. }) = self.platform.find_by_name(folder, vm_name).await? {
            tracing::warn!(vm = %entity, "instance already exists, reusing");
            ctx.report.vms_reused += 1;
            handle
        } else {
            let task = self
                .platform
                .clone_vm(&source, folder, vm_name, &self.settings.placement)
                .await?;
            let vm = ctx.wait(task).await?.into_vm().ok_or_else(|| {
                PlatformError::Backend(format!("clone of '{vm_name}' completed without a VM"))
            })?;
            ctx.report.vms_cloned += 1;
            tracing::info!(vm = %entity, master = %master, instance = index, "cloned service instance");
            vm
        };

        let networks = resolve_networks(
            self.platform,
            ctx,
            &self.exercise.networks,
            entity,
            &instance.networks,
            Some(index),
        )
        .await?;
        reconcile_nics(self.platform, ctx, &vm, &networks).await?;
        Ok(())
    }
}
