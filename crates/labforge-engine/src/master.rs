//! Master materializer
//!
//! Walks the folder tree once, without instance multiplication, and builds
//! one master VM per distinct service under `(MASTER) <key>` folders. Each
//! master is cloned from its service template, reconfigured, wired to the
//! base networks and snapshotted.

use crate::context::MaterializationContext;
use crate::error::{EngineError, LookupKind};
use crate::naming::{master_name, master_path};
use crate::nics::{reconcile_nics, resolve_networks};
use crate::path::{ensure_folder, resolve_path};
use crate::settings::EngineSettings;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use labforge_platform::{Entity, FolderRef, Platform, PlatformError, VmRef};
use labforge_spec::{Exercise, Folder, FolderNode, ServiceInstance};

/// Snapshot taken on every freshly built master
pub const MASTERING_SNAPSHOT: &str = "Start of Mastering";

/// Builds the master tree of one exercise
pub struct MasterBuilder<'a, P: Platform + ?Sized> {
    platform: &'a P,
    exercise: &'a Exercise,
    settings: &'a EngineSettings,
    template_root: &'a FolderRef,
}

impl<'a, P: Platform + ?Sized> MasterBuilder<'a, P> {
    /// Builder cloning templates found below `template_root`
    #[must_use]
    pub fn new(
        platform: &'a P,
        exercise: &'a Exercise,
        settings: &'a EngineSettings,
        template_root: &'a FolderRef,
    ) -> Self {
        Self {
            platform,
            exercise,
            settings,
            template_root,
        }
    }

    /// Materialize `folders` below `parent`
    ///
    /// `path` is the diagnostic path of `parent`, used in log lines and
    /// report entries.
    ///
    /// # Errors
    /// Entity failures are recorded in the report; only cancellation and
    /// structural errors are returned
    pub fn build<'s>(
        &'s self,
        ctx: &'s mut MaterializationContext,
        parent: &'s FolderRef,
        folders: &'s IndexMap<String, Folder>,
        path: &'s str,
    ) -> BoxFuture<'s, Result<(), EngineError>> {
        Box::pin(async move {
            for folder in folders.values() {
                ctx.check_cancelled()?;
                let diag = master_path(path, &folder.name);
                if !folder.meta.enabled {
                    tracing::debug!(folder = %diag, "folder disabled, skipping subtree");
                    ctx.report.skipped += 1;
                    continue;
                }

                let created = ensure_folder(self.platform, parent, &master_name(&folder.name))
                    .await
                    .map_err(EngineError::from);
                let Some((handle, outcome)) = ctx.absorb(&diag, created)? else {
                    continue;
                };
                ctx.note_folder(outcome);

                match &folder.node {
                    FolderNode::Base(services) => self.build_services(ctx, &handle, services, &diag).await?,
                    FolderNode::Parent(children) => self.build(ctx, &handle, children, &diag).await?,
                }
            }
            Ok(())
        })
    }

    async fn build_services(
        &self,
        ctx: &mut MaterializationContext,
        folder: &FolderRef,
        services: &IndexMap<String, ServiceInstance>,
        path: &str,
    ) -> Result<(), EngineError> {
        for instance in services.values() {
            ctx.check_cancelled()?;
            let entity = format!("{path}/{}", instance.name);
            let result = self.build_master(ctx, folder, instance, &entity).await;
            ctx.absorb(&entity, result)?;
        }
        Ok(())
    }

    async fn build_master(
        &self,
        ctx: &mut MaterializationContext,
        folder: &FolderRef,
        instance: &ServiceInstance,
        entity: &str,
    ) -> Result<(), EngineError> {
        let service = self
            .exercise
            .services
            .get(&instance.service)
            .ok_or_else(|| EngineError::lookup(LookupKind::Service, &instance.service))?;
        if service.platform() != self.platform.kind() {
            tracing::debug!(service = %service.name, platform = %service.platform(), "service targets another platform, skipping");
            ctx.report.skipped += 1;
            return Ok(());
        }
        if ctx.is_mastered(&service.name) {
            tracing::debug!(service = %service.name, entity, "service already mastered in this run");
            ctx.report.skipped += 1;
            return Ok(());
        }

        let name = master_name(&service.name);
        if let Some(Entity::Vm { handle, .. }) = self.platform.find_by_name(folder, &name).await? {
            tracing::warn!(master = %name, "master already exists, reusing");
            ctx.mark_mastered(&service.name);
            ctx.report.vms_reused += 1;
            if !self.platform.is_template(&handle).await? {
                self.wire(ctx, &handle, instance, entity).await?;
            }
            return Ok(());
        }

        let template_path = service
            .template_path()
            .ok_or_else(|| EngineError::config(&service.name, "service has no template"))?;
        let template = match resolve_path(self.platform, self.template_root, template_path).await? {
            Some(Entity::Vm { handle, .. }) => handle,
            _ => return Err(EngineError::lookup(LookupKind::Template, template_path)),
        };

        let task = self
            .platform
            .clone_vm(&template, folder, &name, &self.settings.placement)
            .await?;
        let vm = ctx.wait(task).await?.into_vm().ok_or_else(|| {
            PlatformError::Backend(format!("clone of '{name}' completed without a VM"))
        })?;
        ctx.mark_mastered(&service.name);
        ctx.report.vms_cloned += 1;
        tracing::info!(master = %name, template = template_path, "cloned master");

        if !service.resources.is_empty() {
            ctx.wait(self.platform.edit_resources(&vm, &service.resources).await?).await?;
        }
        if let Some(note) = &service.note {
            ctx.wait(self.platform.set_note(&vm, note).await?).await?;
        }

        self.wire(ctx, &vm, instance, entity).await?;

        let description = format!(
            "Beginning of Mastering phase for exercise {}",
            self.exercise.metadata.name
        );
        ctx.wait(self.platform.snapshot(&vm, MASTERING_SNAPSHOT, &description).await?)
            .await?;
        Ok(())
    }

    /// Bind the master's NICs to the base networks; a no-op when already bound
    async fn wire(
        &self,
        ctx: &mut MaterializationContext,
        vm: &VmRef,
        instance: &ServiceInstance,
        entity: &str,
    ) -> Result<(), EngineError> {
        let networks = resolve_networks(
            self.platform,
            ctx,
            &self.exercise.networks,
            entity,
            &instance.networks,
            None,
        )
        .await?;
        reconcile_nics(self.platform, ctx, vm, &networks).await
    }
}
