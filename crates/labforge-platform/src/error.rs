//! Platform faults
//!
//! Every fault is scoped to one entity. Callers in the engine catch them per
//! operation, log the entity name and move on to the next sibling.

/// Failure reported by a platform operation or task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// An object with this name already exists in the container
    #[error("an object named '{name}' already exists")]
    DuplicateName {
        /// Conflicting name
        name: String,
    },

    /// The platform rejected the name
    #[error("invalid name '{name}'")]
    InvalidName {
        /// Rejected name
        name: String,
    },

    /// The VM is in the wrong power state for the operation
    #[error("'{entity}' is in an invalid power state ({state})")]
    InvalidPowerState {
        /// Affected VM
        entity: String,
        /// Current power state
        state: String,
    },

    /// Guest tools are required but not running
    #[error("guest tools unavailable on '{entity}'")]
    ToolsUnavailable {
        /// Affected VM
        entity: String,
    },

    /// Another task is already operating on the entity
    #[error("another task is in progress on '{entity}'")]
    TaskInProgress {
        /// Busy entity
        entity: String,
    },

    /// The entity is in use and cannot be changed
    #[error("'{entity}' is in use")]
    ResourceInUse {
        /// Busy entity
        entity: String,
    },

    /// The referenced entity does not exist
    #[error("'{entity}' not found")]
    NotFound {
        /// Missing entity
        entity: String,
    },

    /// The entity exists but cannot take this operation
    #[error("'{entity}' is in an invalid state: {reason}")]
    InvalidState {
        /// Affected entity
        entity: String,
        /// Explanation
        reason: String,
    },

    /// A task finished in the error state
    #[error("task '{task}' on '{entity}' failed: {message}")]
    TaskFailed {
        /// Task name
        task: String,
        /// Entity the task ran on
        entity: String,
        /// Platform message
        message: String,
    },

    /// A task did not finish before the deadline and was cancelled
    #[error("task '{task}' on '{entity}' timed out after {waited_ms} ms")]
    Timeout {
        /// Task name
        task: String,
        /// Entity the task ran on
        entity: String,
        /// Time spent waiting, queue time excluded
        waited_ms: u64,
    },

    /// The wait was interrupted by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// The backend cannot perform this operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Backend transport or storage failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl PlatformError {
    /// Whether this is a per-entity fault raised by the platform itself
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. }
                | Self::InvalidName { .. }
                | Self::InvalidPowerState { .. }
                | Self::ToolsUnavailable { .. }
                | Self::TaskInProgress { .. }
                | Self::ResourceInUse { .. }
                | Self::InvalidState { .. }
                | Self::TaskFailed { .. }
        )
    }

    /// Whether the caller interrupted the wait
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Shorthand for [`PlatformError::NotFound`]
    #[inline]
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_are_classified() {
        assert!(PlatformError::DuplicateName { name: "x".into() }.is_fault());
        assert!(!PlatformError::Cancelled.is_fault());
        assert!(!PlatformError::not_found("x").is_fault());
        assert!(PlatformError::Cancelled.is_cancelled());
    }

    #[test]
    fn timeout_display() {
        let err = PlatformError::Timeout {
            task: "clone".into(),
            entity: "web".into(),
            waited_ms: 60_000,
        };
        assert_eq!(err.to_string(), "task 'clone' on 'web' timed out after 60000 ms");
    }
}
