//! Engine error taxonomy
//!
//! Most variants describe the failure of a single entity and are recorded in
//! the run report while the walk continues. Only the structural variants
//! (see [`EngineError::is_structural`]) abort a phase call.

use crate::phase::PhaseError;
use crate::threshold::ThresholdExceeded;
use labforge_platform::PlatformError;

/// What a failed lookup was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Service definition
    Service,
    /// Service template
    Template,
    /// Promoted master
    Master,
    /// Network declaration
    Network,
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => f.write_str("service"),
            Self::Template => f.write_str("template"),
            Self::Master => f.write_str("master"),
            Self::Network => f.write_str("network"),
        }
    }
}

/// Errors raised while materializing an exercise
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Instance count above the error threshold
    #[error(transparent)]
    Threshold(#[from] ThresholdExceeded),

    /// Missing or malformed configuration for one entity
    #[error("configuration error in '{name}': {reason}")]
    Config {
        /// Entity
        name: String,
        /// Explanation
        reason: String,
    },

    /// Instance count refers to a group size
    #[error("'{name}' sizes its instances by group '{group}', which is not supported")]
    UnsupportedInstanceCount {
        /// Entity
        name: String,
        /// Referenced group
        group: String,
    },

    /// Programming error in a caller
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced object does not exist
    #[error("{kind} '{name}' not found")]
    Lookup {
        /// What was looked up
        kind: LookupKind,
        /// Name that was looked up
        name: String,
    },

    /// Platform fault
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Template conversion did not take effect
    #[error("'{name}' is still a virtual machine after template conversion")]
    PromotionFailed {
        /// Master name
        name: String,
    },

    /// All VLAN tags have been issued
    #[error("VLAN range exhausted")]
    VlanExhausted,

    /// Phase ordering violated
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// Deployment without a master folder
    #[error("master folder '{path}' not found; run master creation first")]
    MasterFolderAbsent {
        /// Expected location
        path: String,
    },

    /// The exercise root folder cannot be found or created
    #[error("exercise root folder '{path}' unavailable: {reason}")]
    RootFolderUnavailable {
        /// Expected location
        path: String,
        /// Explanation
        reason: String,
    },

    /// The template folder does not exist
    #[error("template folder '{path}' not found")]
    TemplateRootMissing {
        /// Expected location
        path: String,
    },

    /// The run was interrupted
    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    /// Shorthand for [`EngineError::Config`]
    #[inline]
    pub fn config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EngineError::Lookup`]
    #[inline]
    pub fn lookup(kind: LookupKind, name: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            name: name.into(),
        }
    }

    /// Whether the error aborts the whole phase call
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MasterFolderAbsent { .. }
                | Self::RootFolderUnavailable { .. }
                | Self::TemplateRootMissing { .. }
                | Self::Phase(_)
        )
    }

    /// Whether the run was interrupted
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Platform(PlatformError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    #[test]
    fn structural_errors() {
        assert!(EngineError::MasterFolderAbsent { path: "x".into() }.is_structural());
        assert!(EngineError::from(PhaseError::IllegalTransition {
            from: Phase::NotStarted,
            to: Phase::Deployed
        })
        .is_structural());
        assert!(!EngineError::lookup(LookupKind::Master, "(MASTER) web").is_structural());
        assert!(!EngineError::VlanExhausted.is_structural());
    }

    #[test]
    fn platform_cancellation_is_cancellation() {
        assert!(EngineError::from(PlatformError::Cancelled).is_cancelled());
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(!EngineError::from(PlatformError::not_found("x")).is_cancelled());
    }

    #[test]
    fn lookup_display() {
        assert_eq!(
            EngineError::lookup(LookupKind::Template, "Linux/kali").to_string(),
            "template 'Linux/kali' not found"
        );
    }
}
