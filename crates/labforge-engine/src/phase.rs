//! Run phase state machine
//!
//! Deployment may only start from [`Phase::Promoted`] (or re-run from
//! [`Phase::Deployed`]); the transition table makes that barrier checkable.

use serde::Serialize;

/// Progress of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Nothing materialized by this run
    #[default]
    NotStarted,
    /// Master tree built or discovered
    MastersBuilt,
    /// Every master converted to a template
    Promoted,
    /// Environment deployed
    Deployed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not-started"),
            Self::MastersBuilt => f.write_str("masters-built"),
            Self::Promoted => f.write_str("promoted"),
            Self::Deployed => f.write_str("deployed"),
        }
    }
}

/// Phase ordering violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    /// The requested transition is not in the table
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition {
        /// Current phase
        from: Phase,
        /// Requested phase
        to: Phase,
    },
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: Phase) -> Vec<Phase> {
    use Phase::{Deployed, MastersBuilt, NotStarted, Promoted};
    match from {
        NotStarted => vec![NotStarted, MastersBuilt],
        MastersBuilt => vec![NotStarted, MastersBuilt, Promoted],
        Promoted => vec![NotStarted, MastersBuilt, Promoted, Deployed],
        Deployed => vec![NotStarted, MastersBuilt, Promoted, Deployed],
    }
}

/// Check a transition against the table
///
/// # Errors
/// Returns [`PhaseError::IllegalTransition`] if `to` is not reachable from `from`
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), PhaseError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PhaseError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_requires_promotion() {
        assert!(validate_transition(Phase::NotStarted, Phase::Deployed).is_err());
        assert!(validate_transition(Phase::MastersBuilt, Phase::Deployed).is_err());
        assert!(validate_transition(Phase::Promoted, Phase::Deployed).is_ok());
        assert!(validate_transition(Phase::Deployed, Phase::Deployed).is_ok());
    }

    #[test]
    fn promotion_requires_masters() {
        assert_eq!(
            validate_transition(Phase::NotStarted, Phase::Promoted),
            Err(PhaseError::IllegalTransition {
                from: Phase::NotStarted,
                to: Phase::Promoted
            })
        );
        assert!(validate_transition(Phase::MastersBuilt, Phase::Promoted).is_ok());
    }

    #[test]
    fn cleanup_transitions() {
        assert!(validate_transition(Phase::Deployed, Phase::Promoted).is_ok());
        for phase in [Phase::NotStarted, Phase::MastersBuilt, Phase::Promoted, Phase::Deployed] {
            assert!(validate_transition(phase, Phase::NotStarted).is_ok());
        }
    }

    #[test]
    fn display() {
        assert_eq!(
            PhaseError::IllegalTransition {
                from: Phase::MastersBuilt,
                to: Phase::Deployed
            }
            .to_string(),
            "illegal phase transition masters-built -> deployed"
        );
    }
}
