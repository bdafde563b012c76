//! Materialization context threaded through every recursive call
//!
//! Holds the only cross-call mutable state of a run: the network resolver
//! (VLAN cursor and realization cache), the master registry, the report of
//! the current phase call and the set of services already mastered.

use crate::error::EngineError;
use crate::network::NetworkResolver;
use crate::path::FolderOutcome;
use crate::registry::MasterRegistry;
use crate::report::RunReport;
use crate::settings::EngineSettings;
use crate::threshold::{ThresholdGuard, Verdict};
use labforge_platform::{wait_for_task, CancelFlag, PlatformError, PlatformTask, TaskOutput, WaitPolicy};
use std::collections::HashSet;
use uuid::Uuid;

/// State of one run
#[derive(Debug)]
pub struct MaterializationContext {
    /// Run identifier, attached to every log span
    pub run_id: Uuid,
    /// Network resolver
    pub networks: NetworkResolver,
    /// Master registry
    pub registry: MasterRegistry,
    /// Report of the phase call in progress
    pub report: RunReport,
    /// Threshold guard
    pub guard: ThresholdGuard,
    mastered: HashSet<String>,
    cancel: CancelFlag,
    wait: WaitPolicy,
}

impl MaterializationContext {
    /// Fresh context for a run
    #[must_use]
    pub fn new(settings: &EngineSettings, cancel: CancelFlag) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            networks: NetworkResolver::new(settings.vswitch.clone()),
            registry: MasterRegistry::new(),
            report: RunReport::new(run_id, "idle"),
            guard: ThresholdGuard::new(settings.thresholds),
            mastered: HashSet::new(),
            cancel,
            wait: settings.wait,
        }
    }

    /// Cancellation flag of this run
    #[must_use]
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Start the report of a new phase call
    pub fn begin(&mut self, operation: &str) {
        self.report = RunReport::new(self.run_id, operation);
    }

    /// Hand out the report of the finished phase call
    pub fn finish(&mut self) -> RunReport {
        let operation = self.report.operation.clone();
        std::mem::replace(&mut self.report, RunReport::new(self.run_id, operation))
    }

    /// Fail fast if interruption was requested
    ///
    /// # Errors
    /// Returns [`EngineError::Cancelled`]
    pub fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block on a platform task under this run's wait policy
    ///
    /// # Errors
    /// Returns the task's fault, a timeout, or [`EngineError::Cancelled`]
    pub async fn wait(&self, task: Box<dyn PlatformTask>) -> Result<TaskOutput, EngineError> {
        wait_for_task(task, &self.wait, &self.cancel)
            .await
            .map_err(|e| match e {
                PlatformError::Cancelled => EngineError::Cancelled,
                other => EngineError::Platform(other),
            })
    }

    /// Record that `service` has a master; `false` if it already had one
    pub fn mark_mastered(&mut self, service: &str) -> bool {
        self.mastered.insert(service.to_string())
    }

    /// Whether `service` already has a master in this run
    #[inline]
    #[must_use]
    pub fn is_mastered(&self, service: &str) -> bool {
        self.mastered.contains(service)
    }

    /// Forget which services were mastered
    pub fn reset_mastered(&mut self) {
        self.mastered.clear();
    }

    /// Count a threshold warning
    pub fn note_verdict(&mut self, verdict: Verdict) {
        if verdict == Verdict::Warn {
            self.report.warnings += 1;
        }
    }

    /// Count a created or reused folder
    pub fn note_folder(&mut self, outcome: FolderOutcome) {
        match outcome {
            FolderOutcome::Created => self.report.folders_created += 1,
            FolderOutcome::Reused => self.report.folders_reused += 1,
        }
    }

    /// Recover from an entity-level failure
    ///
    /// Cancellation and structural errors pass through; anything else is
    /// logged against `entity`, recorded in the report and swallowed.
    ///
    /// # Errors
    /// Returns `result`'s error when it is structural or a cancellation
    pub fn absorb<T>(&mut self, entity: &str, result: Result<T, EngineError>) -> Result<Option<T>, EngineError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_cancelled() || err.is_structural() => Err(err),
            Err(err) => {
                tracing::error!(entity, error = %err, "skipping entity");
                self.report.fail(entity, &err);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupKind;

    fn ctx() -> MaterializationContext {
        MaterializationContext::new(&EngineSettings::new("Templates"), CancelFlag::new())
    }

    #[test]
    fn absorb_records_entity_failures() {
        let mut ctx = ctx();
        ctx.begin("deploy");
        let out: Option<()> = ctx
            .absorb("Pod/web", Err(EngineError::lookup(LookupKind::Master, "(MASTER) web")))
            .unwrap();
        assert!(out.is_none());
        let report = ctx.finish();
        assert_eq!(report.operation, "deploy");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entity, "Pod/web");
        assert!(ctx.report.failures.is_empty());
    }

    #[test]
    fn absorb_passes_structural_and_cancelled() {
        let mut ctx = ctx();
        assert!(ctx
            .absorb::<()>("x", Err(EngineError::MasterFolderAbsent { path: "x".into() }))
            .is_err());
        assert!(ctx.absorb::<()>("x", Err(EngineError::Cancelled)).is_err());
        assert!(ctx.report.failures.is_empty());
    }

    #[test]
    fn services_are_mastered_once() {
        let mut ctx = ctx();
        assert!(!ctx.is_mastered("nginx"));
        assert!(ctx.mark_mastered("nginx"));
        assert!(ctx.is_mastered("nginx"));
        assert!(!ctx.mark_mastered("nginx"));
        ctx.reset_mastered();
        assert!(ctx.mark_mastered("nginx"));
    }

    #[test]
    fn cancellation_is_observed() {
        let flag = CancelFlag::new();
        let ctx = MaterializationContext::new(&EngineSettings::new("T"), flag.clone());
        assert!(ctx.check_cancelled().is_ok());
        flag.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(EngineError::Cancelled)));
    }
}
