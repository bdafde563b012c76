//! Threshold-guarded instance-count resolution

use crate::error::EngineError;
use crate::threshold::{ThresholdGuard, Verdict};
use indexmap::IndexMap;
use labforge_spec::{GroupSpec, InstanceCount, ObjectKind};

/// A resolved instance count with its naming prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Number of instances to create
    pub count: u32,
    /// Naming prefix
    pub prefix: Option<String>,
    /// Threshold verdict
    pub verdict: Verdict,
}

/// Resolve the instance count of a folder or service and check it
///
/// # Errors
/// - [`EngineError::Config`] for malformed counts or unknown groups
/// - [`EngineError::UnsupportedInstanceCount`] for `size-of` counts
/// - [`EngineError::Threshold`] above the error threshold
pub fn resolve_instances(
    spec: &InstanceCount,
    kind: ObjectKind,
    name: &str,
    guard: &ThresholdGuard,
    groups: &IndexMap<String, GroupSpec>,
) -> Result<Resolved, EngineError> {
    match spec {
        InstanceCount::Number { count, .. } => {
            let verdict = guard.check(kind, name, *count)?;
            Ok(Resolved {
                count: *count,
                prefix: spec.prefix().map(str::to_string),
                verdict,
            })
        }
        InstanceCount::SizeOf { group, .. } => {
            if !groups.contains_key(group) {
                return Err(EngineError::config(
                    name,
                    format!("instance count refers to unknown group '{group}'"),
                ));
            }
            Err(EngineError::UnsupportedInstanceCount {
                name: name.to_string(),
                group: group.clone(),
            })
        }
        InstanceCount::Malformed(reason) => Err(EngineError::config(name, reason.clone())),
    }
}
