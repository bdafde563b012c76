//! Phase-call facade over one exercise and one platform
//!
//! ```text
//! create_masters ──► promote_masters ──► deploy_environment
//!       ▲                                   │
//!       └──── cleanup_masters   cleanup_environment
//! ```
//!
//! Each call runs inside an `info_span!` carrying the run id and returns the
//! [`RunReport`] of that call. Entity-level failures are recorded in the
//! report; only structural errors, phase violations and cancellation are
//! returned as `Err`.

use crate::cleanup::{cleanup, CleanupOptions};
use crate::context::MaterializationContext;
use crate::deploy::Deployer;
use crate::error::EngineError;
use crate::master::MasterBuilder;
use crate::naming::{join_path, GENERIC_SUFFIX, MASTER_FOLDER_NAME, MASTER_PREFIX};
use crate::network::BaseNetwork;
use crate::path::{ensure_folder, resolve_folder_path, FolderOutcome};
use crate::phase::{validate_transition, Phase};
use crate::promote::promote_tree;
use crate::report::RunReport;
use crate::settings::EngineSettings;
use crate::tree::render_tree;
use labforge_platform::{CancelFlag, Entity, FolderRef, Platform};
use labforge_spec::{Exercise, NetworkKind};
use tracing::Instrument;

/// Materializes one exercise onto one platform
pub struct Materializer<P: Platform> {
    platform: P,
    exercise: Exercise,
    settings: EngineSettings,
    ctx: MaterializationContext,
    phase: Phase,
}

impl<P: Platform> Materializer<P> {
    /// Facade in phase [`Phase::NotStarted`]
    #[must_use]
    pub fn new(platform: P, exercise: Exercise, settings: EngineSettings) -> Self {
        let ctx = MaterializationContext::new(&settings, CancelFlag::new());
        Self {
            platform,
            exercise,
            settings,
            ctx,
            phase: Phase::NotStarted,
        }
    }

    /// Observe `cancel` at every wait boundary
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.ctx = MaterializationContext::new(&self.settings, cancel);
        self
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Target platform
    #[inline]
    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Exercise being materialized
    #[inline]
    #[must_use]
    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    /// Run state
    #[inline]
    #[must_use]
    pub fn context(&self) -> &MaterializationContext {
        &self.ctx
    }

    /// Path of the exercise root folder below the platform root
    #[must_use]
    pub fn root_path(&self) -> String {
        join_path(&[
            &self.settings.server_root,
            &self.exercise.metadata.root_path,
            self.exercise.metadata.root_folder_name(),
        ])
    }

    /// Path of the master folder below the platform root
    #[must_use]
    pub fn master_path(&self) -> String {
        join_path(&[&self.root_path(), MASTER_FOLDER_NAME])
    }

    /// Build the master tree and the base networks
    ///
    /// # Errors
    /// - [`EngineError::RootFolderUnavailable`] if the exercise root cannot be found or created
    /// - [`EngineError::TemplateRootMissing`] if the template folder does not exist
    /// - [`EngineError::Phase`] or [`EngineError::Cancelled`]
    pub async fn create_masters(&mut self) -> Result<RunReport, EngineError> {
        let span = tracing::info_span!("create_masters", run_id = %self.ctx.run_id, exercise = %self.exercise.metadata.name);
        self.create_masters_inner().instrument(span).await
    }

    async fn create_masters_inner(&mut self) -> Result<RunReport, EngineError> {
        validate_transition(self.phase, Phase::MastersBuilt)?;
        self.ctx.begin("create-masters");
        self.ctx.reset_mastered();

        let root = self.ensure_root().await?;
        let top = self.platform.root_folder().await?;
        let template_path = join_path(&[&self.settings.server_root, &self.settings.template_folder]);
        let template_root = resolve_folder_path(&self.platform, &top, &template_path)
            .await?
            .ok_or_else(|| EngineError::TemplateRootMissing {
                path: template_path.clone(),
            })?;

        let master_path = self.master_path();
        let (master_root, outcome) = ensure_folder(&self.platform, &root, MASTER_FOLDER_NAME)
            .await
            .map_err(|e| EngineError::RootFolderUnavailable {
                path: master_path.clone(),
                reason: e.to_string(),
            })?;
        self.ctx.note_folder(outcome);

        self.create_base_networks().await?;

        tracing::info!(master_folder = %master_path, "building master tree");
        MasterBuilder::new(&self.platform, &self.exercise, &self.settings, &template_root)
            .build(&mut self.ctx, &master_root, &self.exercise.folders, &master_path)
            .await?;

        self.phase = Phase::MastersBuilt;
        let report = self.ctx.finish();
        tracing::info!(cloned = report.vms_cloned, failures = report.failures.len(), "master creation finished");
        Ok(report)
    }

    async fn create_base_networks(&mut self) -> Result<(), EngineError> {
        for def in self.exercise.networks.iter() {
            self.ctx.check_cancelled()?;
            let result = self
                .ctx
                .networks
                .create_base_network(&self.platform, def, self.settings.default_create)
                .await;
            match self.ctx.absorb(&def.name, result)? {
                Some(BaseNetwork::Created) => self.ctx.report.networks_created += 1,
                Some(BaseNetwork::Skipped) => self.ctx.report.skipped += 1,
                Some(BaseNetwork::Existing) | None => {}
            }
        }
        Ok(())
    }

    /// Power off, snapshot and convert every master, filling the registry
    ///
    /// On a fresh facade the master folder is discovered by name first.
    ///
    /// # Errors
    /// - [`EngineError::MasterFolderAbsent`] if no master folder exists
    /// - [`EngineError::Phase`] or [`EngineError::Cancelled`]
    pub async fn promote_masters(&mut self) -> Result<RunReport, EngineError> {
        let span = tracing::info_span!("promote_masters", run_id = %self.ctx.run_id, exercise = %self.exercise.metadata.name);
        async move {
            self.ctx.begin("promote-masters");
            let master_root = self.discover_masters().await?;
            self.promote(&master_root).await?;
            Ok(self.ctx.finish())
        }
        .instrument(span)
        .await
    }

    async fn discover_masters(&mut self) -> Result<FolderRef, EngineError> {
        let master_path = self.master_path();
        let top = self.platform.root_folder().await?;
        let master_root = resolve_folder_path(&self.platform, &top, &master_path)
            .await?
            .ok_or_else(|| EngineError::MasterFolderAbsent {
                path: master_path.clone(),
            })?;
        if self.phase == Phase::NotStarted {
            validate_transition(self.phase, Phase::MastersBuilt)?;
            self.phase = Phase::MastersBuilt;
            tracing::info!("discovered existing master folder");
        }
        Ok(master_root)
    }

    async fn promote(&mut self, master_root: &FolderRef) -> Result<(), EngineError> {
        validate_transition(self.phase, Phase::Promoted)?;
        self.ctx.registry.clear();
        let master_path = self.master_path();
        promote_tree(
            &self.platform,
            &mut self.ctx,
            master_root,
            &master_path,
            &self.exercise.metadata.name,
        )
        .await?;
        self.phase = Phase::Promoted;
        tracing::info!(masters = self.ctx.registry.len(), "masters promoted");
        Ok(())
    }

    /// Deploy every folder and service instance from the promoted masters
    ///
    /// Masters are promoted first unless this facade already promoted them.
    ///
    /// # Errors
    /// - [`EngineError::MasterFolderAbsent`] if master creation never ran
    /// - [`EngineError::Phase`] or [`EngineError::Cancelled`]
    pub async fn deploy_environment(&mut self) -> Result<RunReport, EngineError> {
        let span = tracing::info_span!("deploy_environment", run_id = %self.ctx.run_id, exercise = %self.exercise.metadata.name);
        self.deploy_inner().instrument(span).await
    }

    async fn deploy_inner(&mut self) -> Result<RunReport, EngineError> {
        self.ctx.begin("deploy-environment");
        let master_root = self.discover_masters().await?;
        if self.phase == Phase::MastersBuilt {
            self.promote(&master_root).await?;
        }
        validate_transition(self.phase, Phase::Deployed)?;

        let root_path = self.root_path();
        let top = self.platform.root_folder().await?;
        let root = resolve_folder_path(&self.platform, &top, &root_path)
            .await?
            .ok_or_else(|| EngineError::RootFolderUnavailable {
                path: root_path.clone(),
                reason: "not found".to_string(),
            })?;

        tracing::info!(root = %root_path, "deploying environment");
        Deployer::new(&self.platform, &self.exercise, &self.settings)
            .deploy(&mut self.ctx, &root, &self.exercise.folders, &root_path, 0)
            .await?;

        self.phase = Phase::Deployed;
        let report = self.ctx.finish();
        tracing::info!(cloned = report.vms_cloned, failures = report.failures.len(), "deployment finished");
        Ok(report)
    }

    /// Destroy the master tree, and the declared base networks if asked
    ///
    /// # Errors
    /// - [`EngineError::MasterFolderAbsent`] if there is nothing to clean
    /// - [`EngineError::Cancelled`]
    pub async fn cleanup_masters(&mut self, network_cleanup: bool) -> Result<RunReport, EngineError> {
        let span = tracing::info_span!("cleanup_masters", run_id = %self.ctx.run_id, exercise = %self.exercise.metadata.name);
        self.cleanup_masters_inner(network_cleanup).instrument(span).await
    }

    async fn cleanup_masters_inner(&mut self, network_cleanup: bool) -> Result<RunReport, EngineError> {
        validate_transition(self.phase, Phase::NotStarted)?;
        self.ctx.begin("cleanup-masters");
        let master_path = self.master_path();
        let top = self.platform.root_folder().await?;
        let master_root = resolve_folder_path(&self.platform, &top, &master_path)
            .await?
            .ok_or_else(|| EngineError::MasterFolderAbsent {
                path: master_path.clone(),
            })?;

        let options = CleanupOptions {
            recursive: true,
            destroy_folders: true,
            destroy_self: true,
            ..CleanupOptions::default()
        }
        .with_prefix(MASTER_PREFIX);
        cleanup(&self.platform, &mut self.ctx, &master_root, &master_path, &options).await?;

        if network_cleanup {
            let names: Vec<String> = self.exercise.networks.iter().map(|def| def.name.clone()).collect();
            self.destroy_networks(&names).await?;
            self.ctx.networks.forget_realized();
        }

        self.ctx.registry.clear();
        self.ctx.reset_mastered();
        self.phase = Phase::NotStarted;
        Ok(self.ctx.finish())
    }

    /// Destroy everything below the exercise root except the master folder,
    /// and the realized generic networks if asked
    ///
    /// # Errors
    /// - [`EngineError::RootFolderUnavailable`] if the exercise root does not exist
    /// - [`EngineError::Cancelled`]
    pub async fn cleanup_environment(&mut self, network_cleanup: bool) -> Result<RunReport, EngineError> {
        let span = tracing::info_span!("cleanup_environment", run_id = %self.ctx.run_id, exercise = %self.exercise.metadata.name);
        self.cleanup_environment_inner(network_cleanup).instrument(span).await
    }

    async fn cleanup_environment_inner(&mut self, network_cleanup: bool) -> Result<RunReport, EngineError> {
        let next = match self.phase {
            Phase::Deployed => Phase::Promoted,
            other => other,
        };
        validate_transition(self.phase, next)?;
        self.ctx.begin("cleanup-environment");

        let root_path = self.root_path();
        let top = self.platform.root_folder().await?;
        let root = resolve_folder_path(&self.platform, &top, &root_path)
            .await?
            .ok_or_else(|| EngineError::RootFolderUnavailable {
                path: root_path.clone(),
                reason: "not found".to_string(),
            })?;

        let options = CleanupOptions {
            destroy_folders: true,
            keep: vec![MASTER_FOLDER_NAME.to_string()],
            ..CleanupOptions::default()
        };
        cleanup(&self.platform, &mut self.ctx, &root, &root_path, &options).await?;

        if network_cleanup {
            let prefixes: Vec<String> = self
                .exercise
                .networks
                .iter()
                .filter(|def| def.kind == NetworkKind::Generic)
                .map(|def| format!("{}{GENERIC_SUFFIX}", def.name).to_lowercase())
                .collect();
            let listed = self.platform.networks().await.map_err(EngineError::from);
            let existing = self.ctx.absorb("networks", listed)?.unwrap_or_default();
            let realized: Vec<String> = existing
                .into_iter()
                .filter(|name| {
                    let lower = name.to_lowercase();
                    prefixes.iter().any(|prefix| lower.starts_with(prefix))
                })
                .collect();
            self.destroy_networks(&realized).await?;
            self.ctx.networks.forget_realized();
        }

        self.phase = next;
        Ok(self.ctx.finish())
    }

    async fn destroy_networks(&mut self, names: &[String]) -> Result<(), EngineError> {
        for name in names {
            self.ctx.check_cancelled()?;
            let exists = self.platform.network_exists(name).await.map_err(EngineError::from);
            if self.ctx.absorb(name, exists)? != Some(true) {
                continue;
            }
            let removed = self.platform.destroy_network(name).await.map_err(EngineError::from);
            if self.ctx.absorb(name, removed)?.is_some() {
                self.ctx.report.networks_destroyed += 1;
                tracing::info!(network = %name, "destroyed network");
            }
        }
        Ok(())
    }

    /// Indented text tree of the exercise root
    ///
    /// # Errors
    /// Returns [`EngineError::RootFolderUnavailable`] if the root does not exist
    pub async fn render(&self) -> Result<String, EngineError> {
        let root_path = self.root_path();
        let top = self.platform.root_folder().await?;
        let root = resolve_folder_path(&self.platform, &top, &root_path)
            .await?
            .ok_or_else(|| EngineError::RootFolderUnavailable {
                path: root_path.clone(),
                reason: "not found".to_string(),
            })?;
        Ok(render_tree(&self.platform, &root, &root_path).await?)
    }

    /// Find the exercise root, creating its last segment if needed
    async fn ensure_root(&mut self) -> Result<FolderRef, EngineError> {
        let root_path = self.root_path();
        let unavailable = |reason: String| EngineError::RootFolderUnavailable {
            path: root_path.clone(),
            reason,
        };

        let parent_path = join_path(&[&self.settings.server_root, &self.exercise.metadata.root_path]);
        let top = self.platform.root_folder().await.map_err(|e| unavailable(e.to_string()))?;
        let parent = resolve_folder_path(&self.platform, &top, &parent_path)
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .ok_or_else(|| unavailable(format!("parent folder '{parent_path}' not found")))?;

        let name = self.exercise.metadata.root_folder_name();
        match self.platform.find_by_name(&parent, name).await {
            Ok(Some(Entity::Folder { handle, .. })) => {
                self.ctx.note_folder(FolderOutcome::Reused);
                Ok(handle)
            }
            Ok(Some(_)) => Err(unavailable(format!("'{name}' exists and is not a folder"))),
            Ok(None) => {
                let handle = self
                    .platform
                    .create_folder(&parent, name)
                    .await
                    .map_err(|e| unavailable(e.to_string()))?;
                tracing::info!(root = %root_path, "created exercise root folder");
                self.ctx.note_folder(FolderOutcome::Created);
                Ok(handle)
            }
            Err(e) => Err(unavailable(e.to_string())),
        }
    }
}
