//! Instance-count threshold guard

use labforge_spec::{ObjectKind, Thresholds};

/// Count above the error threshold; nothing is created for it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{name}' requests {count} instances, above the error threshold of {limit}")]
pub struct ThresholdExceeded {
    /// Object kind
    pub kind: ObjectKind,
    /// Folder or service name
    pub name: String,
    /// Requested count
    pub count: u32,
    /// Error threshold
    pub limit: u32,
}

/// Outcome of a passing check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// At or below the warn threshold
    Proceed,
    /// Above warn, at or below error; a warning was logged
    Warn,
}

/// Checks requested counts against warn/error limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThresholdGuard {
    thresholds: Thresholds,
}

impl ThresholdGuard {
    /// Guard over the given table
    #[inline]
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Check `count` instances of `name`
    ///
    /// # Errors
    /// Returns [`ThresholdExceeded`] when `count` is above the error limit
    pub fn check(&self, kind: ObjectKind, name: &str, count: u32) -> Result<Verdict, ThresholdExceeded> {
        let limit = self.thresholds.for_kind(kind);
        if count > limit.error {
            tracing::error!(%kind, name, count, limit = limit.error, "instance count above error threshold");
            Err(ThresholdExceeded {
                kind,
                name: name.to_string(),
                count,
                limit: limit.error,
            })
        } else if count > limit.warn {
            tracing::warn!(%kind, name, count, limit = limit.warn, "instance count above warning threshold");
            Ok(Verdict::Warn)
        } else {
            Ok(Verdict::Proceed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labforge_spec::Threshold;

    fn guard() -> ThresholdGuard {
        ThresholdGuard::new(Thresholds {
            folder: Threshold::new(2, 4),
            service: Threshold::new(5, 10),
        })
    }

    #[test]
    fn boundaries() {
        let g = guard();
        assert_eq!(g.check(ObjectKind::Folder, "Pod", 2), Ok(Verdict::Proceed));
        assert_eq!(g.check(ObjectKind::Folder, "Pod", 3), Ok(Verdict::Warn));
        assert_eq!(g.check(ObjectKind::Folder, "Pod", 4), Ok(Verdict::Warn));
        let err = g.check(ObjectKind::Folder, "Pod", 5).unwrap_err();
        assert_eq!(err.limit, 4);
        assert_eq!(err.count, 5);
    }

    #[test]
    fn kinds_use_their_own_limits() {
        let g = guard();
        assert_eq!(g.check(ObjectKind::Service, "web", 5), Ok(Verdict::Proceed));
        assert!(g.check(ObjectKind::Folder, "Pod", 5).is_err());
    }

    #[test]
    fn defaults() {
        let g = ThresholdGuard::default();
        assert_eq!(g.check(ObjectKind::Folder, "f", 50), Ok(Verdict::Warn));
        assert!(g.check(ObjectKind::Folder, "f", 51).is_err());
        assert_eq!(g.check(ObjectKind::Service, "s", 50), Ok(Verdict::Proceed));
        assert!(g.check(ObjectKind::Service, "s", 71).is_err());
    }

    #[test]
    fn display() {
        let err = guard().check(ObjectKind::Service, "web", 11).unwrap_err();
        assert_eq!(
            err.to_string(),
            "service 'web' requests 11 instances, above the error threshold of 10"
        );
    }
}
