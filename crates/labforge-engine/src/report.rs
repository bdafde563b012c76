//! Per-call run report

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// One entity that failed or was skipped with an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    /// Entity path or name
    pub entity: String,
    /// Error text
    pub reason: String,
}

/// Counters and failures of one phase call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Run the call belongs to
    pub run_id: Uuid,
    /// Phase call name
    pub operation: String,
    /// Folders created
    pub folders_created: u32,
    /// Existing folders reused
    pub folders_reused: u32,
    /// VMs cloned
    pub vms_cloned: u32,
    /// Existing VMs reused
    pub vms_reused: u32,
    /// Masters converted to templates
    pub masters_promoted: u32,
    /// Masters that already were templates
    pub templates_reused: u32,
    /// Networks created
    pub networks_created: u32,
    /// VMs destroyed
    pub vms_destroyed: u32,
    /// Folders destroyed
    pub folders_destroyed: u32,
    /// Networks destroyed
    pub networks_destroyed: u32,
    /// Entities skipped on purpose (disabled, other platform, already done)
    pub skipped: u32,
    /// Threshold warnings
    pub warnings: u32,
    /// Failed entities
    pub failures: Vec<EntityFailure>,
}

impl RunReport {
    /// Empty report for a call
    #[must_use]
    pub fn new(run_id: Uuid, operation: impl Into<String>) -> Self {
        Self {
            run_id,
            operation: operation.into(),
            ..Self::default()
        }
    }

    /// Record a failed entity
    pub fn fail(&mut self, entity: impl Into<String>, reason: impl fmt::Display) {
        self.failures.push(EntityFailure {
            entity: entity.into(),
            reason: reason.to_string(),
        });
    }

    /// Whether no entity failed
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (run {})", self.operation, self.run_id)?;
        let counters = [
            ("folders created", self.folders_created),
            ("folders reused", self.folders_reused),
            ("vms cloned", self.vms_cloned),
            ("vms reused", self.vms_reused),
            ("masters promoted", self.masters_promoted),
            ("templates reused", self.templates_reused),
            ("networks created", self.networks_created),
            ("vms destroyed", self.vms_destroyed),
            ("folders destroyed", self.folders_destroyed),
            ("networks destroyed", self.networks_destroyed),
            ("skipped", self.skipped),
            ("warnings", self.warnings),
        ];
        for (label, value) in counters.iter().filter(|(_, value)| *value > 0) {
            writeln!(f, "  {label:<20} {value}")?;
        }
        if self.failures.is_empty() {
            write!(f, "  no failures")
        } else {
            write!(f, "  {} failures:", self.failures.len())?;
            for failure in &self.failures {
                write!(f, "\n    {}: {}", failure.entity, failure.reason)?;
            }
            Ok(())
        }
    }
}
